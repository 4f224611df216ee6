use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// 虚拟机操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VmOperationKind {
    Start,
    Stop,
    Delete,
    Clone,
}

impl VmOperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Delete => "delete",
            Self::Clone => "clone",
        }
    }
}

impl fmt::Display for VmOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 错误分类
///
/// 重试策略的白名单和 CLI 的退出码都按这个分类判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    Timeout,
    Connection,
    CommandTimeout,
    InvalidArgument,
    HostNotFound,
    VmNotFound,
    VmOperationFailed,
    Internal,
}

fn on_host(host: &Option<String>) -> String {
    match host {
        Some(host) => format!(" (主机 {})", host),
        None => String::new(),
    }
}

fn for_user(username: &Option<String>) -> String {
    match username {
        Some(username) => format!(" (用户 {})", username),
        None => String::new(),
    }
}

/// 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("配置文件不存在: {0}")]
    ConfigNotFound(String),

    #[error("SSH 认证失败: {host}{}", for_user(.username))]
    SshAuthentication {
        host: String,
        username: Option<String>,
    },

    #[error("SSH 连接超时: {host} ({timeout_secs}秒)")]
    SshTimeout { host: String, timeout_secs: u64 },

    #[error("SSH 连接失败: {host}: {message}")]
    SshConnection { host: String, message: String },

    #[error("远程命令超时: {host} ({timeout_secs}秒): {command}")]
    CommandTimeout {
        host: String,
        command: String,
        timeout_secs: u64,
    },

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("主机不存在: {0}")]
    HostNotFound(String),

    #[error("虚拟机不存在: {vm_name}{}", on_host(.host))]
    VmNotFound {
        vm_name: String,
        host: Option<String>,
    },

    #[error("虚拟机操作失败: {operation} {vm_name}{}: {message}", on_host(.host))]
    VmOperation {
        vm_name: String,
        operation: VmOperationKind,
        host: Option<String>,
        message: String,
    },

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// 虚拟机不存在
    pub fn vm_not_found(vm_name: impl Into<String>, host: impl Into<String>) -> Self {
        Self::VmNotFound {
            vm_name: vm_name.into(),
            host: Some(host.into()),
        }
    }

    /// 虚拟机操作失败
    pub fn vm_operation(
        vm_name: impl Into<String>,
        operation: VmOperationKind,
        host: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::VmOperation {
            vm_name: vm_name.into(),
            operation,
            host: Some(host.into()),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::ConfigNotFound(_) => ErrorKind::Configuration,
            Self::SshAuthentication { .. } => ErrorKind::Authentication,
            Self::SshTimeout { .. } => ErrorKind::Timeout,
            Self::SshConnection { .. } => ErrorKind::Connection,
            Self::CommandTimeout { .. } => ErrorKind::CommandTimeout,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::HostNotFound(_) => ErrorKind::HostNotFound,
            Self::VmNotFound { .. } => ErrorKind::VmNotFound,
            Self::VmOperation { .. } => ErrorKind::VmOperationFailed,
            Self::Serialization(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// 是否属于连接类错误（认证、连接超时、传输失败）
    pub fn is_connection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Authentication | ErrorKind::Timeout | ErrorKind::Connection
        )
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;
