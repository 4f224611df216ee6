/// 日志初始化
///
/// 终端日志级别由 `-v` 次数决定，`RUST_LOG` 优先；配置了 `logging.file`
/// 时额外写入日志文件

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// `-v` 次数对应的终端日志级别
pub fn console_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn file_level(logging: &LoggingConfig) -> LevelFilter {
    match logging.filter_level() {
        "debug" => LevelFilter::DEBUG,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// 初始化全局日志，重复调用时忽略
pub fn init(verbosity: u8, logging: &LoggingConfig) {
    // 可以通过环境变量 RUST_LOG 设置日志级别，例如：
    // RUST_LOG=remote=debug fleetctl vm list
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level(verbosity)));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .with_filter(console_filter);

    let mut file_error = None;
    let file = match logging.file_path() {
        Some(path) => match open_log_file(&path) {
            Ok(file) => Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_writer(Mutex::new(file))
                    .with_filter(file_level(logging)),
            ),
            Err(e) => {
                file_error = Some(format!("无法打开日志文件 {}: {}", path.display(), e));
                None
            }
        },
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();

    if let Some(message) = file_error {
        warn!("{}", message);
    }
}
