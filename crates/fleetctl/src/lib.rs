/// Easy VM Fleet - fleetctl
///
/// 通过 SSH 在多台主机上管理 tart 虚拟机

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod output;
pub mod services;

pub use config::{Config, ConfigManager};
pub use services::{BatchOutcome, VmService};
