/// Easy VM Fleet - fleetctl
///
/// 命令行入口

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, info};

use fleetctl::cli::{Cli, Command};
use fleetctl::commands::{self, config_cmd, Context};
use fleetctl::config::{ConfigManager, LoggingConfig};
use fleetctl::logging;

#[tokio::main]
async fn main() -> ExitCode {
    // .env 需要在解析参数前加载，FLEETCTL_CONFIG 可能来自其中
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let debug = cli.debug;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if debug {
                eprintln!("{:?}", e);
            } else if !commands::is_domain_error(&e) {
                eprintln!("使用 --debug 或 -vv 查看详细信息");
            }
            ExitCode::from(commands::exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // config 子命令不依赖有效的配置文件
    if let Command::Config(command) = cli.command {
        logging::init(cli.verbose, &LoggingConfig::default());
        return config_cmd::run(command, cli.config);
    }

    let config = ConfigManager::load(cli.config)?;
    logging::init(cli.verbose, &config.config().logging);

    info!("🚀 fleetctl 启动");
    debug!("配置文件: {}", config.path().display());
    if cli.dry_run {
        info!("dry-run 模式，不会执行远程命令");
    }

    // dry-run 不会连接主机，无需密码
    let credential = if cli.ask_password && !cli.dry_run {
        Some(commands::prompt_password("远程主机")?)
    } else {
        None
    };

    let mut ctx = Context::new(config, cli.dry_run).with_credential(credential);
    let result = commands::dispatch(&mut ctx, cli.command).await;
    ctx.cleanup().await;

    result
}
