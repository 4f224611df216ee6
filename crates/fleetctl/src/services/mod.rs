/// 业务服务层

pub mod vm_service;

pub use vm_service::{BatchOutcome, VmService};
