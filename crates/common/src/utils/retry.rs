/// 指数退避重试
///
/// 第 i 次重试前的等待时间为 `min(base_delay * exponential_base^(i-1), max_delay)`，
/// 启用抖动时再乘以 `[1.0, 1.5)` 之间的随机系数

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::errors::{Error, ErrorKind, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含第一次）
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
    /// 允许重试的错误分类，其它错误立即返回
    pub retry_on: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
            jitter: true,
            retry_on: vec![ErrorKind::Connection, ErrorKind::Timeout],
        }
    }
}

impl RetryPolicy {
    /// 只重试连接类错误（认证失败除外，用同一凭据重试不会成功）
    pub fn connection_errors(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn retry_on(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retry_on = kinds.into_iter().collect();
        self
    }

    pub fn should_retry(&self, err: &Error) -> bool {
        self.retry_on.contains(&err.kind())
    }

    /// 不含抖动的等待时间，`attempt` 从 1 开始
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        if self.jitter {
            delay.mul_f64(rand::thread_rng().gen_range(1.0..1.5))
        } else {
            delay
        }
    }

    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_with_observer(op, |_, _| {}).await
    }

    /// 执行操作，`on_retry` 在每次等待前被调用（用于日志），不影响重试行为
    pub async fn run_with_observer<T, F, Fut, O>(&self, mut op: F, mut on_retry: O) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        O: FnMut(&Error, u32),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.should_retry(&err) {
                return Err(err);
            }

            if attempt >= max_attempts {
                error!("全部 {} 次尝试均失败: {}", max_attempts, err);
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            warn!(
                "第 {}/{} 次尝试失败: {}，{:.2} 秒后重试",
                attempt,
                max_attempts,
                err,
                delay.as_secs_f64()
            );
            on_retry(&err, attempt);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn transient(attempt: u32) -> Error {
        Error::SshConnection {
            host: "10.0.0.1".into(),
            message: format!("attempt {}", attempt),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::connection_errors(3)
            .with_delays(Duration::from_secs(1), Duration::from_secs(30))
            .with_jitter(false)
    }

    #[test]
    fn test_base_delay_grows_and_is_capped() {
        let policy = RetryPolicy::connection_errors(10)
            .with_delays(Duration::from_secs(1), Duration::from_secs(5))
            .with_jitter(false);

        assert_eq!(policy.base_delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.base_delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.base_delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.base_delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.base_delay_for(60), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = policy().with_jitter(true);
        for _ in 0..100 {
            let delay = policy.delay_for(2);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay < Duration::from_secs(3));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0u32);
        let mut retries = Vec::new();
        let started = tokio::time::Instant::now();

        let value = policy()
            .run_with_observer(
                || {
                    let n = calls.get() + 1;
                    calls.set(n);
                    async move {
                        if n <= 2 {
                            Err(transient(n))
                        } else {
                            Ok("done")
                        }
                    }
                },
                |_, attempt| retries.push(attempt),
            )
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(calls.get(), 3);
        assert_eq!(retries, vec![1, 2]);
        // 1s + 2s
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_returns_last_error() {
        let calls = Cell::new(0u32);
        let err = policy()
            .run(|| {
                let n = calls.get() + 1;
                calls.set(n);
                async move { Err::<(), _>(transient(n)) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.get(), 3);
        match err {
            Error::SshConnection { message, .. } => assert_eq!(message, "attempt 3"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_propagates_immediately() {
        let calls = Cell::new(0u32);
        let started = tokio::time::Instant::now();
        let err = policy()
            .run(|| {
                calls.set(calls.get() + 1);
                async {
                    Err::<(), _>(Error::SshAuthentication {
                        host: "10.0.0.1".into(),
                        username: None,
                    })
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.get(), 1);
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_allow_list() {
        let calls = Cell::new(0u32);
        let policy = policy().retry_on([ErrorKind::VmOperationFailed]);

        let _ = policy
            .run(|| {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(transient(1)) }
            })
            .await;

        assert_eq!(calls.get(), 1);
    }
}
