/// Easy VM Fleet - 公共库
///
/// 提供各 crate 共享的数据模型、错误处理、重试策略与工具函数

pub mod errors;
pub mod models;
pub mod utils;

// 重新导出常用类型
pub use errors::{Error, ErrorKind, Result, VmOperationKind};
pub use models::{Host, HostRegistry, Vm, VmState};
pub use utils::retry::RetryPolicy;
