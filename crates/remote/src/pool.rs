/// SSH 会话连接池
///
/// 每台主机（按名称）最多保留一个会话。查找、复用、替换都在同一把锁内完成，
/// 命令执行在锁外进行

use common::models::constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_POOL_MAX_AGE};
use common::{Error, Host, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::session::{Connector, Credential, RemoteSession};

/// 连接池参数
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    /// 会话最大存活时间，超过后在下次获取时重建
    pub max_age: Duration,
    /// 建立连接（含认证）的超时
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(DEFAULT_POOL_MAX_AGE),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
        }
    }
}

/// 池中的会话及其创建时间
struct PooledSession<S> {
    session: Arc<S>,
    created_at: Instant,
}

impl<S: RemoteSession> PooledSession<S> {
    fn is_reusable(&self, max_age: Duration) -> bool {
        self.session.is_alive() && self.created_at.elapsed() < max_age
    }
}

/// SSH 会话连接池
pub struct ConnectionPool<C: Connector> {
    connector: C,
    settings: PoolSettings,
    /// 所有会话：host name -> session
    sessions: Mutex<HashMap<String, PooledSession<C::Session>>>,
}

impl<C: Connector> ConnectionPool<C> {
    pub fn new(connector: C, settings: PoolSettings) -> Self {
        Self {
            connector,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 获取主机会话
    ///
    /// 已有会话仍存活且未过期时直接复用，否则关闭旧会话并新建
    pub async fn acquire(
        &self,
        host: &Host,
        credential: Option<&Credential>,
        force_new: bool,
    ) -> Result<Arc<C::Session>> {
        let mut sessions = self.sessions.lock().await;

        if !force_new {
            if let Some(pooled) = sessions.get(&host.name) {
                if pooled.is_reusable(self.settings.max_age) {
                    debug!(host = %host.name, "复用连接池中的会话");
                    return Ok(pooled.session.clone());
                }
            }
        }

        if let Some(stale) = sessions.remove(&host.name) {
            debug!(host = %host.name, "移除失效会话");
            if let Err(e) = stale.session.close().await {
                debug!(host = %host.name, "关闭失效会话失败: {}", e);
            }
        }

        let session = Arc::new(self.connect(host, credential, self.settings.connect_timeout).await?);
        sessions.insert(
            host.name.clone(),
            PooledSession {
                session: session.clone(),
                created_at: Instant::now(),
            },
        );
        info!(host = %host.name, "已建立 SSH 会话");

        Ok(session)
    }

    /// 建立一个不放入池中的会话
    pub async fn connect_detached(
        &self,
        host: &Host,
        credential: Option<&Credential>,
        timeout: Duration,
    ) -> Result<C::Session> {
        self.connect(host, credential, timeout).await
    }

    async fn connect(
        &self,
        host: &Host,
        credential: Option<&Credential>,
        timeout: Duration,
    ) -> Result<C::Session> {
        match tokio::time::timeout(timeout, self.connector.connect(host, credential)).await {
            Ok(result) => result,
            Err(_) => Err(Error::SshTimeout {
                host: host.hostname.clone(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    /// 会话在执行中出现协议错误时调用，仅当池中仍是同一会话时才移除
    pub async fn invalidate(&self, host_name: &str, session: &Arc<C::Session>) {
        let mut sessions = self.sessions.lock().await;
        let same = sessions
            .get(host_name)
            .map(|pooled| Arc::ptr_eq(&pooled.session, session))
            .unwrap_or(false);

        if same {
            if let Some(pooled) = sessions.remove(host_name) {
                let _ = pooled.session.close().await;
                debug!(host = %host_name, "会话已失效，移出连接池");
            }
        }
    }

    /// 关闭指定主机的会话
    pub async fn close(&self, host_name: &str) {
        let mut sessions = self.sessions.lock().await;
        if let Some(pooled) = sessions.remove(host_name) {
            let _ = pooled.session.close().await;
            debug!(host = %host_name, "已关闭会话");
        }
    }

    /// 关闭所有会话
    pub async fn close_all(&self) {
        let mut sessions = self.sessions.lock().await;
        for (_, pooled) in sessions.drain() {
            let _ = pooled.session.close().await;
        }
        debug!("已关闭所有 SSH 会话");
    }

    /// 当前池中仍存活的主机名（已排序）
    pub async fn active_connections(&self) -> Vec<String> {
        let sessions = self.sessions.lock().await;
        let mut names: Vec<String> = sessions
            .iter()
            .filter(|(_, pooled)| pooled.session.is_alive())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}
