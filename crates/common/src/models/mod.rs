/// 共享数据模型
///
/// 定义主机、虚拟机及其状态

pub mod host;
pub mod vm;

pub use host::{Host, HostRegistry};
pub use vm::{ListingEntry, Vm, VmState};

/// 常量定义
pub mod constants {
    /// 默认 SSH 端口
    pub const DEFAULT_SSH_PORT: u16 = 22;

    /// 远程虚拟化工具
    pub const REMOTE_TOOL: &str = "tart";

    /// 默认 SSH 连接超时（秒）
    pub const DEFAULT_CONNECT_TIMEOUT: u64 = 30;

    /// 连接池中会话的最大存活时间（秒）
    pub const DEFAULT_POOL_MAX_AGE: u64 = 300;

    /// 连通性测试超时（秒）
    pub const TEST_CONNECTION_TIMEOUT: u64 = 10;

    /// 新建虚拟机默认 CPU 核数
    pub const DEFAULT_VM_CPU: u32 = 4;

    /// 新建虚拟机默认内存（MB）
    pub const DEFAULT_VM_MEMORY: u32 = 8192;

    /// 新建虚拟机默认磁盘（GB）
    pub const DEFAULT_VM_DISK: u32 = 50;

    /// 默认远程操作超时（秒）
    pub const DEFAULT_OPERATION_TIMEOUT: u64 = 300;

    /// 虚拟机最小内存（MB）
    pub const MIN_VM_MEMORY: u32 = 512;
}
