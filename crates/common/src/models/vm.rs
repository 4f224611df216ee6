/// 虚拟机模型
///
/// 每次远程查询都会构造新的 `Vm`，不跨操作缓存

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::constants::MIN_VM_MEMORY;

/// 虚拟机状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VmState {
    Running,
    Stopped,
    Starting,
    Stopping,
    Suspended,
    Unknown,
}

impl VmState {
    /// 解析远程工具上报的状态字符串，无法识别时返回 `Unknown`
    pub fn from_remote(state: &str) -> Self {
        match state.trim().to_lowercase().as_str() {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "starting" => Self::Starting,
            "stopping" => Self::Stopping,
            "suspended" => Self::Suspended,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Suspended => "suspended",
            Self::Unknown => "unknown",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Running => "●",
            Self::Stopped => "○",
            Self::Starting => "◐",
            Self::Stopping => "◑",
            Self::Suspended => "◉",
            Self::Unknown => "?",
        }
    }
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `tart list --format json` 输出中的单条记录
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingEntry {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,

    #[serde(rename = "State", default)]
    pub state: Option<String>,

    #[serde(rename = "CPU", default)]
    pub cpu: Option<u64>,

    #[serde(rename = "Memory", default)]
    pub memory: Option<u64>,

    #[serde(rename = "Disk", default)]
    pub disk: Option<u64>,

    #[serde(rename = "Source", default)]
    pub source: Option<String>,
}

/// 远程主机上的虚拟机
///
/// (host, name) 是唯一稳定的标识，其余字段以最近一次远程查询为准
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vm {
    pub name: String,
    pub host: String,
    pub state: VmState,

    /// CPU 核数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,

    /// 内存（MB）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,

    /// 磁盘（GB）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
}

impl Vm {
    pub fn new(name: impl Into<String>, host: impl Into<String>, state: VmState) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            state,
            cpu: None,
            memory: None,
            disk: None,
            ip_address: None,
            created_at: None,
            source_image: None,
        }
    }

    /// 根据列表输出构造虚拟机记录
    ///
    /// 超出取值范围的资源字段会被丢弃，记录本身保留
    pub fn from_listing(host: &str, entry: ListingEntry) -> Self {
        let name = entry.name.unwrap_or_else(|| "unknown".to_string());
        let state = entry
            .state
            .as_deref()
            .map(VmState::from_remote)
            .unwrap_or(VmState::Unknown);

        let cpu = bounded(&name, "CPU", entry.cpu, 1);
        let memory = bounded(&name, "Memory", entry.memory, MIN_VM_MEMORY);
        let disk = bounded(&name, "Disk", entry.disk, 1);

        Self {
            cpu,
            memory,
            disk,
            source_image: entry.source,
            ..Self::new(name, host, state)
        }
    }

    /// 带状态符号的展示字符串，例如 `● running`
    pub fn status_display(&self) -> String {
        format!("{} {}", self.state.symbol(), self.state)
    }

    /// 内存展示，例如 `8 GB`
    pub fn memory_display(&self) -> String {
        match self.memory {
            None => "N/A".to_string(),
            Some(mb) if mb >= 1024 => format!("{} GB", mb / 1024),
            Some(mb) => format!("{} MB", mb),
        }
    }
}

fn bounded(vm_name: &str, field: &str, value: Option<u64>, min: u32) -> Option<u32> {
    let value = value?;
    match u32::try_from(value) {
        Ok(v) if v >= min => Some(v),
        _ => {
            debug!("忽略虚拟机 {} 的无效字段 {}: {}", vm_name, field, value);
            None
        }
    }
}
