use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::batch::BatchCommand;
use crate::commands::config_cmd::ConfigCommand;
use crate::commands::hosts::HostsCommand;
use crate::commands::vm::VmCommand;
use crate::config::CONFIG_ENV;

#[derive(Parser, Debug)]
#[command(
    name = "fleetctl",
    version,
    about = "通过 SSH 管理多台主机上的 tart 虚拟机"
)]
pub struct Cli {
    /// 日志详细程度（-v info，-vv debug，-vvv trace）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// 只打印将要执行的命令，不实际执行
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// 出错时输出完整错误链
    #[arg(long, global = true)]
    pub debug: bool,

    /// 配置文件路径
    #[arg(long, env = CONFIG_ENV, global = true)]
    pub config: Option<PathBuf>,

    /// 远程操作前提示输入 SSH 密码（未配置密钥时使用）
    #[arg(long, global = true)]
    pub ask_password: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 主机管理
    #[command(subcommand)]
    Hosts(HostsCommand),

    /// 虚拟机管理
    #[command(subcommand)]
    Vm(VmCommand),

    /// 按名称模式批量操作
    #[command(subcommand)]
    Batch(BatchCommand),

    /// 配置文件管理
    #[command(subcommand)]
    Config(ConfigCommand),
}
