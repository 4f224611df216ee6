/// 主机模型

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::constants::DEFAULT_SSH_PORT;
use crate::errors::{Error, Result};
use crate::utils;

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// 运行虚拟机的远程主机
///
/// 以 `name` 为唯一标识，其它模块只通过名称引用主机
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Host {
    /// 主机唯一名称
    pub name: String,

    /// IP 地址或域名
    pub hostname: String,

    /// SSH 用户名，未设置时使用当前本地用户
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// SSH 端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// SSH 私钥路径
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,
}

impl Host {
    pub fn new(name: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            username: None,
            port: DEFAULT_SSH_PORT,
            ssh_key: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ssh_key(mut self, ssh_key: impl Into<String>) -> Self {
        self.ssh_key = Some(ssh_key.into());
        self
    }

    /// 校验主机参数
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("主机名称不能为空".to_string()));
        }
        if self.hostname.trim().is_empty() {
            return Err(Error::Config(format!("主机 {} 的地址不能为空", self.name)));
        }
        if self.port == 0 {
            return Err(Error::Config(format!(
                "主机 {} 的端口无效: {} (应为 1-65535)",
                self.name, self.port
            )));
        }
        Ok(())
    }

    /// 展示用名称，例如 `mac-builder-1 (192.168.1.100)`
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.hostname)
    }

    /// 实际使用的 SSH 用户名
    pub fn effective_username(&self) -> String {
        self.username.clone().unwrap_or_else(utils::local_username)
    }

    /// 展开 `~` 后的私钥路径
    pub fn key_path(&self) -> Option<PathBuf> {
        self.ssh_key.as_deref().map(utils::expand_tilde)
    }
}

/// 主机注册表
///
/// 由配置层提供，编排层只读取，不修改主机信息
pub trait HostRegistry: Send + Sync {
    /// 按名称查找主机
    fn resolve(&self, name: &str) -> Option<Host>;

    /// 按注册顺序返回全部主机
    fn all(&self) -> Vec<Host>;
}
