/// 配置文件命令

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::config::{resolve_config_path, ConfigManager};
use crate::output::{render_value, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示当前配置
    Show(ShowArgs),

    /// 校验配置文件
    Validate,

    /// 生成示例配置文件
    Init(InitArgs),

    /// 显示配置文件路径
    Path,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// 覆盖已有配置文件
    #[arg(long)]
    pub force: bool,
}

pub fn run(command: ConfigCommand, path: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show(args) => {
            let manager = ConfigManager::load(path)?;
            if args.format != OutputFormat::Json {
                println!("# {}", manager.path().display());
            }
            println!("{}", render_value(manager.config(), args.format)?);
        }
        ConfigCommand::Validate => {
            let manager = ConfigManager::load_existing(path)?;
            println!(
                "✓ 配置有效: {} ({} 台主机)",
                manager.path().display(),
                manager.hosts().len()
            );
        }
        ConfigCommand::Init(args) => {
            let created = ConfigManager::create_example(path, args.force)?;
            println!("✓ 已生成示例配置: {}", created.display());
        }
        ConfigCommand::Path => {
            println!("{}", resolve_config_path(path).display());
        }
    }

    Ok(())
}
