/// 远程 Shell 会话
///
/// `RemoteSession`/`Connector` 是连接池与具体 SSH 实现之间的接口，
/// 默认实现基于 russh

use async_trait::async_trait;
use common::{Error, Host, Result};
use russh::client;
use russh::keys::{self, PrivateKeyWithHashAlg};
use russh::{ChannelMsg, Disconnect};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// 远程命令的原始输出
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

/// 认证凭据（密码）
#[derive(Clone)]
pub struct Credential {
    password: String,
}

impl Credential {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").field("password", &"***").finish()
    }
}

/// 一个已认证的远程会话，只绑定一台主机
#[async_trait]
pub trait RemoteSession: Send + Sync + 'static {
    /// 传输层是否仍然可用
    fn is_alive(&self) -> bool;

    /// 执行命令并等待结束；协议层错误以 `Error::SshConnection` 返回
    async fn exec(&self, command: &str) -> Result<RawOutput>;

    async fn close(&self) -> Result<()>;
}

/// 会话工厂
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: RemoteSession;

    /// 建立并认证新会话；认证失败返回 `Error::SshAuthentication`
    async fn connect(&self, host: &Host, credential: Option<&Credential>) -> Result<Self::Session>;
}

/// russh 客户端处理器，接受所有主机密钥
pub struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

/// 基于 russh 的 SSH 会话
pub struct SshSession {
    handle: client::Handle<ClientHandler>,
    hostname: String,
}

impl SshSession {
    fn protocol_error(&self, err: russh::Error) -> Error {
        Error::SshConnection {
            host: self.hostname.clone(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    fn is_alive(&self) -> bool {
        !self.handle.is_closed()
    }

    async fn exec(&self, command: &str) -> Result<RawOutput> {
        // 每条命令使用独立 channel，连接本身在多次调用间复用
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| self.protocol_error(e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| self.protocol_error(e))?;

        let mut output = RawOutput {
            exit_code: -1,
            ..RawOutput::default()
        };

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => {
                    output.stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    output.exit_code = i32::try_from(exit_status).unwrap_or(i32::MAX)
                }
                _ => {}
            }
        }

        Ok(output)
    }

    async fn close(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| self.protocol_error(e))
    }
}

/// 基于 russh 的会话工厂
#[derive(Clone)]
pub struct SshConnector {
    config: Arc<client::Config>,
}

impl SshConnector {
    pub fn new() -> Self {
        Self {
            config: Arc::new(client::Config::default()),
        }
    }

    /// 候选私钥：主机配置的私钥在前，其后是 ~/.ssh 下的常见默认私钥
    fn candidate_keys(host: &Host) -> Vec<PathBuf> {
        let mut keys = Vec::new();

        if let Some(path) = host.key_path() {
            if path.exists() {
                keys.push(path);
            } else {
                warn!("SSH 私钥不存在: {}", path.display());
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in ["id_ed25519", "id_ecdsa", "id_rsa"] {
                let path = home.join(".ssh").join(name);
                if path.exists() && !keys.contains(&path) {
                    keys.push(path);
                }
            }
        }

        keys
    }

    async fn authenticate(
        handle: &mut client::Handle<ClientHandler>,
        host: &Host,
        username: &str,
        credential: Option<&Credential>,
    ) -> Result<bool> {
        let transport_error = |e: russh::Error| Error::SshConnection {
            host: host.hostname.clone(),
            message: e.to_string(),
        };

        for path in Self::candidate_keys(host) {
            let key = match keys::load_secret_key(&path, None) {
                Ok(key) => key,
                Err(e) => {
                    debug!("无法加载私钥 {}: {}", path.display(), e);
                    continue;
                }
            };

            let auth = handle
                .authenticate_publickey(username, PrivateKeyWithHashAlg::new(Arc::new(key), None))
                .await
                .map_err(transport_error)?;
            if auth.success() {
                debug!("私钥认证成功: {}", path.display());
                return Ok(true);
            }
        }

        if let Some(credential) = credential {
            let auth = handle
                .authenticate_password(username, credential.secret())
                .await
                .map_err(transport_error)?;
            if auth.success() {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self, host: &Host, credential: Option<&Credential>) -> Result<SshSession> {
        let username = host.effective_username();
        debug!("连接 {}:{} (用户 {})", host.hostname, host.port, username);

        let mut handle = client::connect(
            self.config.clone(),
            (host.hostname.as_str(), host.port),
            ClientHandler,
        )
        .await
        .map_err(|e| Error::SshConnection {
            host: host.hostname.clone(),
            message: e.to_string(),
        })?;

        if !Self::authenticate(&mut handle, host, &username, credential).await? {
            let _ = handle.disconnect(Disconnect::ByApplication, "", "en").await;
            return Err(Error::SshAuthentication {
                host: host.hostname.clone(),
                username: Some(username),
            });
        }

        debug!("已连接到 {}", host.name);
        Ok(SshSession {
            handle,
            hostname: host.hostname.clone(),
        })
    }
}
