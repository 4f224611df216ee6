/// CLI 命令处理

pub mod batch;
pub mod config_cmd;
pub mod hosts;
pub mod vm;

use anyhow::Result;
use common::ErrorKind;
use inquire::{Confirm, InquireError, Password};
use remote::{CommandExecutor, CommandRunner, Credential};
use std::sync::Arc;

use crate::cli::Command;
use crate::config::ConfigManager;
use crate::services::VmService;

/// 各命令共享的运行上下文
pub struct Context {
    pub config: ConfigManager,
    pub dry_run: bool,
    /// 远程操作使用的 SSH 密码，未设置时只使用密钥认证
    credential: Option<Credential>,
    runner: Option<Arc<dyn CommandRunner>>,
}

impl Context {
    pub fn new(config: ConfigManager, dry_run: bool) -> Self {
        Self {
            config,
            dry_run,
            credential: None,
            runner: None,
        }
    }

    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    /// 命令执行器，首次使用时按配置创建
    pub fn runner(&mut self) -> Arc<dyn CommandRunner> {
        let config = self.config.config();
        let (settings, retry, timeout) = (
            config.ssh.pool_settings(),
            config.ssh.retry_policy(),
            config.defaults.command_timeout(),
        );

        self.runner
            .get_or_insert_with(|| -> Arc<dyn CommandRunner> {
                Arc::new(CommandExecutor::with_ssh(settings, retry, timeout))
            })
            .clone()
    }

    pub fn vm_service(&mut self) -> VmService {
        let runner = self.runner();
        VmService::new(
            runner,
            Arc::new(self.config.clone()),
            self.config.config().defaults.clone(),
        )
        .with_credential(self.credential.clone())
        .with_dry_run(self.dry_run)
    }

    /// dry-run 模式下给输出加前缀
    pub fn report(&self, message: impl AsRef<str>) {
        if self.dry_run {
            println!("[dry-run] {}", message.as_ref());
        } else {
            println!("{}", message.as_ref());
        }
    }

    /// 关闭所有连接
    pub async fn cleanup(&self) {
        if let Some(runner) = &self.runner {
            runner.close_all().await;
        }
    }
}

/// 需要确认的操作；`assume_yes` 时直接通过，用户取消视为否
pub fn confirm(message: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }

    match Confirm::new(message).with_default(false).prompt() {
        Ok(answer) => Ok(answer),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// 读取 SSH 密码，`target` 为提示中显示的主机
pub fn prompt_password(target: &str) -> Result<Credential> {
    let password = Password::new(&format!("{} 的 SSH 密码:", target))
        .without_confirmation()
        .prompt()?;
    Ok(Credential::password(password))
}

/// 分发子命令（`config` 子命令不需要上下文，由入口单独处理）
pub async fn dispatch(ctx: &mut Context, command: Command) -> Result<()> {
    match command {
        Command::Hosts(cmd) => hosts::run(ctx, cmd).await,
        Command::Vm(cmd) => vm::run(ctx, cmd).await,
        Command::Batch(cmd) => batch::run(ctx, cmd).await,
        Command::Config(cmd) => config_cmd::run(cmd, Some(ctx.config.path().to_path_buf())),
    }
}

/// 错误对应的进程退出码
pub fn exit_code(err: &anyhow::Error) -> u8 {
    let Some(err) = err.downcast_ref::<common::Error>() else {
        return 1;
    };
    if err.is_connection() {
        return 3;
    }

    match err.kind() {
        ErrorKind::Configuration => 2,
        ErrorKind::CommandTimeout => 3,
        ErrorKind::HostNotFound => 4,
        ErrorKind::VmNotFound => 5,
        ErrorKind::VmOperationFailed => 6,
        _ => 1,
    }
}

/// 是否为已归类的业务错误
pub fn is_domain_error(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<common::Error>().map(|e| e.kind()),
        Some(kind) if kind != ErrorKind::Internal
    )
}
