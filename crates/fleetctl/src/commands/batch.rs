/// 批量操作命令

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use common::VmState;

use super::{confirm, Context};
use crate::output::{render_list, OutputFormat};
use crate::services::BatchOutcome;

#[derive(Subcommand, Debug)]
pub enum BatchCommand {
    /// 启动所有匹配的虚拟机
    Start(BatchArgs),

    /// 停止所有匹配的虚拟机
    Stop(BatchStopArgs),

    /// 列出匹配的虚拟机
    List(BatchListArgs),
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// 名称通配模式，例如 `ci-*`
    #[arg(short, long)]
    pub pattern: String,

    /// 只处理指定主机
    #[arg(long)]
    pub host: Option<String>,

    /// 跳过确认
    #[arg(short, long)]
    pub yes: bool,

    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct BatchStopArgs {
    #[command(flatten)]
    pub common: BatchArgs,

    /// 强制停止
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct BatchListArgs {
    #[arg(short, long)]
    pub pattern: String,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// 批量操作类型
#[derive(Debug, Clone, Copy)]
enum Action {
    Start,
    Stop { force: bool },
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Self::Start => "启动",
            Self::Stop { .. } => "停止",
        }
    }

    /// 已处于目标状态的虚拟机不会被操作
    fn target_state(&self) -> VmState {
        match self {
            Self::Start => VmState::Running,
            Self::Stop { .. } => VmState::Stopped,
        }
    }
}

pub async fn run(ctx: &mut Context, command: BatchCommand) -> Result<()> {
    match command {
        BatchCommand::Start(args) => execute(ctx, args, Action::Start).await,
        BatchCommand::Stop(args) => execute(ctx, args.common, Action::Stop { force: args.force }).await,
        BatchCommand::List(args) => {
            let vms = ctx
                .vm_service()
                .list(args.host.as_deref(), Some(&args.pattern))
                .await?;
            if vms.is_empty() && args.format == OutputFormat::Table {
                println!("没有匹配 {} 的虚拟机", args.pattern);
            } else {
                println!("{}", render_list(&vms, args.format)?);
            }
            Ok(())
        }
    }
}

async fn execute(ctx: &mut Context, args: BatchArgs, action: Action) -> Result<()> {
    let service = ctx.vm_service();

    let vms = service.list(args.host.as_deref(), Some(&args.pattern)).await?;
    if vms.is_empty() {
        println!("没有匹配 {} 的虚拟机", args.pattern);
        return Ok(());
    }

    let pending = vms
        .iter()
        .filter(|vm| vm.state != action.target_state())
        .count();
    println!("{}", render_list(&vms, OutputFormat::Table)?);

    if ctx.dry_run {
        println!(
            "[dry-run] 将{} {} 台虚拟机（共匹配 {} 台）",
            action.verb(),
            pending,
            vms.len()
        );
        return Ok(());
    }

    let prompt = format!("确定{} {} 台虚拟机?", action.verb(), pending);
    if !confirm(&prompt, args.yes)? {
        println!("已取消");
        return Ok(());
    }

    let outcomes = match action {
        Action::Start => service.batch_start(&args.pattern, args.host.as_deref()).await?,
        Action::Stop { force } => {
            service
                .batch_stop(&args.pattern, args.host.as_deref(), force)
                .await?
        }
    };

    println!("{}", render_list(&outcomes, args.format)?);
    summarize(&outcomes)
}

fn summarize(outcomes: &[BatchOutcome]) -> Result<()> {
    let failed = outcomes.iter().filter(|o| !o.success).count();
    println!("成功 {}，失败 {}", outcomes.len() - failed, failed);

    if failed > 0 {
        bail!("{} 台虚拟机操作失败", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context;
    use crate::services::vm_service::tests::FakeRunner;
    use std::sync::Arc;

    const LIST: &str = "tart list --format json";

    fn args(pattern: &str) -> BatchArgs {
        BatchArgs {
            pattern: pattern.to_string(),
            host: None,
            yes: true,
            format: OutputFormat::Json,
        }
    }

    fn outcome(name: &str, success: bool) -> BatchOutcome {
        BatchOutcome {
            name: name.to_string(),
            host: "A".to_string(),
            success,
            message: String::new(),
        }
    }

    #[test]
    fn test_summarize() {
        assert!(summarize(&[outcome("a", true), outcome("b", true)]).is_ok());

        let err = summarize(&[outcome("a", true), outcome("b", false)]).unwrap_err();
        assert!(err.to_string().contains('1'));
    }

    #[test]
    fn test_action_target_state() {
        assert_eq!(Action::Start.target_state(), VmState::Running);
        assert_eq!(Action::Stop { force: true }.target_state(), VmState::Stopped);
        assert_eq!(Action::Stop { force: false }.verb(), "停止");
    }

    #[tokio::test]
    async fn test_dry_run_batch_issues_no_remote_commands() {
        let runner = Arc::new(FakeRunner::default());
        runner.ok("mac-builder-1", LIST, r#"[{"Name":"ci-1","State":"stopped"}]"#);
        let mut ctx = context(runner.clone(), true);

        execute(&mut ctx, args("ci-*"), Action::Start).await.unwrap();
        execute(&mut ctx, args("ci-*"), Action::Stop { force: true }).await.unwrap();

        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_start_runs_matched_vms() {
        let runner = Arc::new(FakeRunner::default());
        runner.ok("mac-builder-1", LIST, r#"[{"Name":"ci-1","State":"stopped"}]"#);
        let mut ctx = context(runner.clone(), false);

        execute(&mut ctx, args("ci-*"), Action::Start).await.unwrap();

        assert!(runner
            .calls()
            .contains(&("mac-builder-1".to_string(), "tart run ci-1 --no-graphics".to_string())));
    }
}
