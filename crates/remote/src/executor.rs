/// 远程命令执行器
///
/// 通过连接池获取会话（连接类错误按重试策略重试），执行命令并返回
/// `RemoteCommandResult`

use async_trait::async_trait;
use common::models::constants::TEST_CONNECTION_TIMEOUT;
use common::{Error, Host, Result, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::pool::{ConnectionPool, PoolSettings};
use crate::result::RemoteCommandResult;
use crate::session::{Connector, Credential, RemoteSession, SshConnector};

/// dry-run 模式下返回的 stdout
pub const DRY_RUN_SENTINEL: &str = "[dry-run mode - command not executed]";

/// 单次执行参数
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub credential: Option<Credential>,
    /// 命令执行超时，未设置时使用执行器默认值
    pub timeout: Option<Duration>,
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// 命令执行接口
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// 在主机上执行命令
    async fn run(&self, host: &Host, command: &str, options: &RunOptions) -> Result<RemoteCommandResult>;

    /// 用独立会话测试连通性，返回 (是否成功, 说明)
    async fn test_connection(&self, host: &Host, credential: Option<&Credential>) -> (bool, String);

    /// 当前存活的连接
    async fn active_connections(&self) -> Vec<String>;

    /// 关闭所有连接
    async fn close_all(&self);
}

/// 基于连接池的命令执行器
pub struct CommandExecutor<C: Connector = SshConnector> {
    pool: ConnectionPool<C>,
    retry: RetryPolicy,
    default_timeout: Duration,
}

impl CommandExecutor<SshConnector> {
    /// 使用 russh 连接的执行器
    pub fn with_ssh(settings: PoolSettings, retry: RetryPolicy, default_timeout: Duration) -> Self {
        Self::new(SshConnector::new(), settings, retry, default_timeout)
    }
}

impl<C: Connector> CommandExecutor<C> {
    pub fn new(connector: C, settings: PoolSettings, retry: RetryPolicy, default_timeout: Duration) -> Self {
        Self {
            pool: ConnectionPool::new(connector, settings),
            retry,
            default_timeout,
        }
    }

    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }

    async fn acquire(&self, host: &Host, credential: Option<&Credential>) -> Result<Arc<C::Session>> {
        let pool = &self.pool;
        self.retry
            .run_with_observer(
                move || pool.acquire(host, credential, false),
                |err, attempt| debug!(host = %host.name, attempt, "获取会话失败: {}", err),
            )
            .await
    }

    async fn execute(&self, host: &Host, command: &str, options: &RunOptions) -> Result<RemoteCommandResult> {
        let session = self.acquire(host, options.credential.as_ref()).await?;
        let timeout = options.timeout.unwrap_or(self.default_timeout);

        debug!(host = %host.name, "执行命令: {}", command);

        let raw = match tokio::time::timeout(timeout, session.exec(command)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                // 协议层已判定会话不可用，移出连接池
                self.pool.invalidate(&host.name, &session).await;
                return Err(e);
            }
            Err(_) => {
                warn!(host = %host.name, "命令执行超时 ({}秒): {}", timeout.as_secs(), command);
                return Err(Error::CommandTimeout {
                    host: host.name.clone(),
                    command: command.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        };

        let result = RemoteCommandResult::from_raw(&host.name, command, raw);
        if result.success() {
            debug!(host = %host.name, "命令执行成功");
        } else {
            warn!(
                host = %host.name,
                "命令退出码 {}: {}\n{}",
                result.exit_code(),
                command,
                result.output()
            );
        }

        Ok(result)
    }

    async fn check_connection(&self, host: &Host, credential: Option<&Credential>) -> Result<bool> {
        let timeout = Duration::from_secs(TEST_CONNECTION_TIMEOUT);
        let session = self.pool.connect_detached(host, credential, timeout).await?;

        let outcome = tokio::time::timeout(timeout, session.exec("echo ok")).await;
        let _ = session.close().await;

        match outcome {
            Ok(Ok(raw)) => Ok(String::from_utf8_lossy(&raw.stdout).trim() == "ok"),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::SshTimeout {
                host: host.hostname.clone(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl<C: Connector> CommandRunner for CommandExecutor<C> {
    async fn run(&self, host: &Host, command: &str, options: &RunOptions) -> Result<RemoteCommandResult> {
        if options.dry_run {
            info!(host = %host.name, "[dry-run] {}", command);
            return Ok(RemoteCommandResult::new(&host.name, command, DRY_RUN_SENTINEL, "", 0));
        }

        self.execute(host, command, options).await
    }

    async fn test_connection(&self, host: &Host, credential: Option<&Credential>) -> (bool, String) {
        match self.check_connection(host, credential).await {
            Ok(true) => (true, format!("已连接到 {}", host.display_name())),
            Ok(false) => (false, format!("{} 返回了意外的响应", host.name)),
            Err(e @ Error::SshAuthentication { .. }) => (false, format!("认证失败: {}", e)),
            Err(e @ Error::SshTimeout { .. }) => (false, format!("连接超时: {}", e)),
            Err(e @ Error::SshConnection { .. }) => (false, format!("连接失败: {}", e)),
            Err(e) => (false, format!("未知错误: {}", e)),
        }
    }

    async fn active_connections(&self) -> Vec<String> {
        self.pool.active_connections().await
    }

    async fn close_all(&self) {
        self.pool.close_all().await;
    }
}
