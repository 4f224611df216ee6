/// 主机管理命令

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use common::Host;

use super::{confirm, prompt_password, Context};
use crate::output::{render_item, render_list, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum HostsCommand {
    /// 添加主机
    Add(AddArgs),

    /// 列出所有主机
    List(ListArgs),

    /// 删除主机
    Remove(RemoveArgs),

    /// 测试 SSH 连接
    Test(TestArgs),

    /// 查看主机详情
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// 主机名称（唯一）
    pub name: String,

    /// IP 地址或域名
    pub hostname: String,

    /// SSH 用户名
    #[arg(short, long)]
    pub username: Option<String>,

    /// SSH 私钥路径
    #[arg(short = 'k', long)]
    pub ssh_key: Option<String>,

    /// SSH 端口
    #[arg(short, long, default_value_t = 22)]
    pub port: u16,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub name: String,

    /// 跳过确认
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct TestArgs {
    pub name: String,

    /// 提示输入 SSH 密码
    #[arg(long)]
    pub password: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub name: String,

    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub async fn run(ctx: &mut Context, command: HostsCommand) -> Result<()> {
    match command {
        HostsCommand::Add(args) => add(ctx, args),
        HostsCommand::List(args) => list(ctx, args),
        HostsCommand::Remove(args) => remove(ctx, args),
        HostsCommand::Test(args) => test(ctx, args).await,
        HostsCommand::Show(args) => show(ctx, args),
    }
}

fn add(ctx: &mut Context, args: AddArgs) -> Result<()> {
    let mut host = Host::new(args.name, args.hostname).with_port(args.port);
    if let Some(username) = args.username {
        host = host.with_username(username);
    }
    if let Some(ssh_key) = args.ssh_key {
        host = host.with_ssh_key(ssh_key);
    }

    let display = host.display_name();
    ctx.config.add_host(host)?;
    println!("✓ 已添加主机 {}", display);
    Ok(())
}

fn list(ctx: &Context, args: ListArgs) -> Result<()> {
    let hosts = ctx.config.hosts();
    if hosts.is_empty() && args.format == OutputFormat::Table {
        println!("未配置任何主机，使用 `fleetctl hosts add` 添加");
        return Ok(());
    }

    println!("{}", render_list(hosts, args.format)?);
    Ok(())
}

fn remove(ctx: &mut Context, args: RemoveArgs) -> Result<()> {
    let host = ctx.config.get_host(&args.name)?;

    if !confirm(&format!("确定删除主机 {}?", host.display_name()), args.yes)? {
        println!("已取消");
        return Ok(());
    }

    ctx.config.remove_host(&args.name)?;
    println!("✓ 已删除主机 {}", args.name);
    Ok(())
}

async fn test(ctx: &mut Context, args: TestArgs) -> Result<()> {
    let host = ctx.config.get_host(&args.name)?;
    let credential = if args.password {
        Some(prompt_password(&host.name)?)
    } else {
        None
    };

    println!("正在测试 {} ...", host.display_name());
    let (ok, message) = ctx.runner().test_connection(&host, credential.as_ref()).await;

    if !ok {
        bail!("✗ {}", message);
    }
    println!("✓ {}", message);
    Ok(())
}

fn show(ctx: &Context, args: ShowArgs) -> Result<()> {
    let host = ctx.config.get_host(&args.name)?;
    println!("{}", render_item(&host, args.format)?);
    Ok(())
}
