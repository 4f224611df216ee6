/// 虚拟机命令

use anyhow::Result;
use clap::{Args, Subcommand};
use common::Error;

use super::{confirm, Context};
use crate::output::{render_item, render_list, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum VmCommand {
    /// 列出虚拟机
    List(ListArgs),

    /// 启动虚拟机
    Start(TargetArgs),

    /// 停止虚拟机
    Stop(StopArgs),

    /// 删除虚拟机
    Delete(DeleteArgs),

    /// 查看虚拟机状态
    Status(StatusArgs),

    /// 克隆虚拟机
    Clone(CloneArgs),

    /// 查看虚拟机 IP
    Ip(TargetArgs),

    /// 从镜像创建虚拟机
    Create(CreateArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// 只查询指定主机
    #[arg(long)]
    pub host: Option<String>,

    /// 名称通配模式，例如 `ci-*`
    #[arg(short, long)]
    pub pattern: Option<String>,

    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    pub name: String,

    /// 虚拟机所在主机
    #[arg(long)]
    pub host: String,
}

#[derive(Args, Debug)]
pub struct StopArgs {
    pub name: String,

    #[arg(long)]
    pub host: String,

    /// 强制停止
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub name: String,

    #[arg(long)]
    pub host: String,

    /// 跳过确认
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub name: String,

    #[arg(long)]
    pub host: String,

    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct CloneArgs {
    /// 源虚拟机或镜像
    pub source: String,

    /// 新虚拟机名称
    pub destination: String,

    #[arg(long)]
    pub host: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub name: String,

    #[arg(long)]
    pub host: String,

    /// 源镜像
    #[arg(long)]
    pub image: String,

    /// CPU 核数（默认取配置值）
    #[arg(long)]
    pub cpu: Option<u32>,

    /// 内存 MB（默认取配置值）
    #[arg(long)]
    pub memory: Option<u32>,

    /// 磁盘 GB（默认取配置值）
    #[arg(long)]
    pub disk: Option<u32>,
}

pub async fn run(ctx: &mut Context, command: VmCommand) -> Result<()> {
    let service = ctx.vm_service();

    match command {
        VmCommand::List(args) => {
            let vms = service
                .list(args.host.as_deref(), args.pattern.as_deref())
                .await?;
            if vms.is_empty() && args.format == OutputFormat::Table {
                println!("未找到虚拟机");
            } else {
                println!("{}", render_list(&vms, args.format)?);
            }
        }
        VmCommand::Start(args) => {
            let vm = service.start(&args.name, &args.host).await?;
            ctx.report(format!("✓ 已启动 {} ({})", vm.name, vm.status_display()));
        }
        VmCommand::Stop(args) => {
            let vm = service.stop(&args.name, &args.host, args.force).await?;
            ctx.report(format!("✓ 已停止 {} ({})", vm.name, vm.status_display()));
        }
        VmCommand::Delete(args) => {
            let prompt = format!("确定删除虚拟机 {} (主机 {})? 此操作不可恢复", args.name, args.host);
            if !confirm(&prompt, args.yes || ctx.dry_run)? {
                println!("已取消");
                return Ok(());
            }
            service.delete(&args.name, &args.host).await?;
            ctx.report(format!("✓ 已删除 {}", args.name));
        }
        VmCommand::Status(args) => {
            let vm = service
                .get(&args.name, &args.host)
                .await?
                .ok_or_else(|| Error::vm_not_found(&args.name, &args.host))?;
            println!("{}", render_item(&vm, args.format)?);
        }
        VmCommand::Clone(args) => {
            let vm = service
                .clone(&args.source, &args.destination, &args.host)
                .await?;
            ctx.report(format!("✓ 已从 {} 克隆 {} ({})", args.source, vm.name, vm.status_display()));
        }
        VmCommand::Ip(args) => match service.ip(&args.name, &args.host).await? {
            Some(ip) => println!("{}", ip),
            None => ctx.report(format!("{} 暂无 IP 地址", args.name)),
        },
        VmCommand::Create(args) => {
            let vm = service
                .create(
                    &args.name,
                    &args.host,
                    &args.image,
                    args.cpu,
                    args.memory,
                    args.disk,
                )
                .await?;
            ctx.report(format!(
                "✓ 已创建 {} (CPU {}，内存 {})",
                vm.name,
                vm.cpu.unwrap_or_default(),
                vm.memory_display()
            ));
        }
    }

    Ok(())
}
