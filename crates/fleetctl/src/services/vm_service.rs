/// 虚拟机编排服务
///
/// 把虚拟机操作翻译成远程 `tart` 命令，解析输出并把失败归类为
/// `VmNotFound` / `VmOperation`。不缓存任何虚拟机状态，每次都以远程结果为准

use common::models::constants::{MIN_VM_MEMORY, REMOTE_TOOL};
use common::models::vm::ListingEntry;
use common::utils::NamePattern;
use common::{Error, Host, HostRegistry, Result, Vm, VmOperationKind, VmState};
use futures::future::join_all;
use remote::{CommandRunner, Credential, RemoteCommandResult, RunOptions, DRY_RUN_SENTINEL};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DefaultsConfig;

/// 批量操作中单个虚拟机的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub name: String,
    pub host: String,
    pub success: bool,
    pub message: String,
}

impl BatchOutcome {
    fn succeeded(vm: &Vm, message: &str) -> Self {
        Self {
            name: vm.name.clone(),
            host: vm.host.clone(),
            success: true,
            message: message.to_string(),
        }
    }

    fn failed(vm: &Vm, err: &Error) -> Self {
        Self {
            name: vm.name.clone(),
            host: vm.host.clone(),
            success: false,
            message: err.to_string(),
        }
    }
}

/// 拼接远程工具命令，参数按 POSIX shell 规则转义
pub fn tool_command(subcommand: &str, args: &[&str]) -> String {
    shell_words::join([REMOTE_TOOL, subcommand].iter().chain(args.iter()))
}

/// 远程工具没有结构化错误，只能按 stderr 中的 "not found" 判断虚拟机不存在
pub fn is_not_found(stderr: &str) -> bool {
    stderr.to_lowercase().contains("not found")
}

fn failure_message(result: &RemoteCommandResult) -> String {
    if result.stderr().is_empty() {
        format!("exit code {}", result.exit_code())
    } else {
        result.stderr().to_string()
    }
}

/// 检查命令结果，失败时区分虚拟机不存在与其它失败
fn check_result(
    result: &RemoteCommandResult,
    vm_name: &str,
    operation: VmOperationKind,
    host_name: &str,
) -> Result<()> {
    if result.success() {
        return Ok(());
    }
    if is_not_found(result.stderr()) {
        return Err(Error::vm_not_found(vm_name, host_name));
    }
    Err(Error::vm_operation(
        vm_name,
        operation,
        host_name,
        failure_message(result),
    ))
}

fn is_placeholder(output: &str) -> bool {
    output.is_empty() || output.starts_with(DRY_RUN_SENTINEL)
}

/// 解析 `tart list --format json` 输出
///
/// 空输出与 dry-run 输出视为没有虚拟机；无法解析时记录日志并返回空列表
pub fn parse_listing(host_name: &str, output: &str) -> Vec<Vm> {
    let output = output.trim();
    if is_placeholder(output) {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<ListingEntry>>(output) {
        Ok(entries) => entries
            .into_iter()
            .map(|entry| Vm::from_listing(host_name, entry))
            .collect(),
        Err(e) => {
            warn!(host = %host_name, "无法解析虚拟机列表: {}", e);
            Vec::new()
        }
    }
}

/// 虚拟机编排服务
pub struct VmService {
    runner: Arc<dyn CommandRunner>,
    registry: Arc<dyn HostRegistry>,
    defaults: DefaultsConfig,
    options: RunOptions,
}

impl VmService {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        registry: Arc<dyn HostRegistry>,
        defaults: DefaultsConfig,
    ) -> Self {
        let options = RunOptions::new().with_timeout(defaults.command_timeout());
        Self {
            runner,
            registry,
            defaults,
            options,
        }
    }

    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.options = self.options.with_credential(credential);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.options = self.options.with_dry_run(dry_run);
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    fn host(&self, name: &str) -> Result<Host> {
        self.registry
            .resolve(name)
            .ok_or_else(|| Error::HostNotFound(name.to_string()))
    }

    async fn run_tool(&self, host: &Host, subcommand: &str, args: &[&str]) -> Result<RemoteCommandResult> {
        let command = tool_command(subcommand, args);
        self.runner.run(host, &command, &self.options).await
    }

    async fn list_on_host(&self, host: &Host) -> Vec<Vm> {
        match self.run_tool(host, "list", &["--format", "json"]).await {
            Ok(result) if result.success() => parse_listing(&host.name, result.stdout()),
            Ok(result) => {
                warn!(host = %host.name, "列出虚拟机失败: {}", failure_message(&result));
                Vec::new()
            }
            Err(e) => {
                warn!(host = %host.name, "列出虚拟机失败: {}", e);
                Vec::new()
            }
        }
    }

    /// 列出虚拟机
    ///
    /// 未指定主机时查询全部主机；单台主机失败只记录日志，按没有虚拟机处理
    pub async fn list(&self, host_filter: Option<&str>, pattern: Option<&str>) -> Result<Vec<Vm>> {
        let pattern = pattern.map(NamePattern::new).transpose()?;

        let hosts = match host_filter {
            Some(name) => vec![self.host(name)?],
            None => self.registry.all(),
        };

        if hosts.is_empty() {
            warn!("未配置任何主机");
            return Ok(Vec::new());
        }

        // join_all 保持输入顺序，结果按注册顺序拼接
        let per_host = join_all(hosts.iter().map(|host| self.list_on_host(host))).await;
        let mut vms: Vec<Vm> = per_host.into_iter().flatten().collect();

        if let Some(pattern) = pattern {
            vms.retain(|vm| pattern.matches(&vm.name));
        }

        debug!("共找到 {} 台虚拟机", vms.len());
        Ok(vms)
    }

    /// 查询单台虚拟机
    pub async fn get(&self, name: &str, host_name: &str) -> Result<Option<Vm>> {
        let vms = self.list(Some(host_name), None).await?;
        Ok(vms
            .into_iter()
            .find(|vm| vm.name == name && vm.host == host_name))
    }

    /// 启动虚拟机
    ///
    /// 启动命令成功后重新查询状态，查询失败时返回 `starting` 状态
    pub async fn start(&self, name: &str, host_name: &str) -> Result<Vm> {
        let host = self.host(host_name)?;
        let result = self.run_tool(&host, "run", &[name, "--no-graphics"]).await?;
        check_result(&result, name, VmOperationKind::Start, &host.name)?;
        info!(host = %host.name, "已启动虚拟机 {}", name);

        match self.get(name, &host.name).await {
            Ok(Some(vm)) => Ok(vm),
            Ok(None) => Ok(Vm::new(name, &host.name, VmState::Starting)),
            Err(e) => {
                debug!(host = %host.name, "刷新虚拟机 {} 状态失败: {}", name, e);
                Ok(Vm::new(name, &host.name, VmState::Starting))
            }
        }
    }

    /// 停止虚拟机，`force` 对应 `--force`
    pub async fn stop(&self, name: &str, host_name: &str, force: bool) -> Result<Vm> {
        let host = self.host(host_name)?;
        let mut args = vec![name];
        if force {
            args.push("--force");
        }

        let result = self.run_tool(&host, "stop", &args).await?;
        check_result(&result, name, VmOperationKind::Stop, &host.name)?;
        info!(host = %host.name, "已停止虚拟机 {}", name);

        Ok(Vm::new(name, &host.name, VmState::Stopped))
    }

    /// 删除虚拟机
    pub async fn delete(&self, name: &str, host_name: &str) -> Result<bool> {
        let host = self.host(host_name)?;
        let result = self.run_tool(&host, "delete", &[name]).await?;
        check_result(&result, name, VmOperationKind::Delete, &host.name)?;
        info!(host = %host.name, "已删除虚拟机 {}", name);

        Ok(true)
    }

    /// 克隆虚拟机，新虚拟机处于停止状态
    pub async fn clone(&self, source: &str, destination: &str, host_name: &str) -> Result<Vm> {
        let host = self.host(host_name)?;
        let result = self.run_tool(&host, "clone", &[source, destination]).await?;

        if !result.success() {
            return Err(Error::vm_operation(
                destination,
                VmOperationKind::Clone,
                &host.name,
                format!("从 {} 克隆失败: {}", source, failure_message(&result)),
            ));
        }
        info!(host = %host.name, "已从 {} 克隆虚拟机 {}", source, destination);

        Ok(Vm::new(destination, &host.name, VmState::Stopped))
    }

    /// 从镜像创建虚拟机
    ///
    /// 先克隆，再尽力设置 CPU/内存；设置失败只记录日志。
    /// 返回值中的资源字段为请求值（未指定时取默认值），不回查远程实际配置
    pub async fn create(
        &self,
        name: &str,
        host_name: &str,
        source_image: &str,
        cpu: Option<u32>,
        memory: Option<u32>,
        disk: Option<u32>,
    ) -> Result<Vm> {
        let cpu = cpu.unwrap_or(self.defaults.vm_cpu);
        let memory = memory.unwrap_or(self.defaults.vm_memory);
        let disk = disk.unwrap_or(self.defaults.vm_disk);

        if cpu == 0 {
            return Err(Error::InvalidArgument("CPU 核数至少为 1".to_string()));
        }
        if memory < MIN_VM_MEMORY {
            return Err(Error::InvalidArgument(format!(
                "内存至少为 {} MB",
                MIN_VM_MEMORY
            )));
        }
        if disk == 0 {
            return Err(Error::InvalidArgument("磁盘至少为 1 GB".to_string()));
        }

        let mut vm = self.clone(source_image, name, host_name).await?;
        let host = self.host(host_name)?;

        let (cpu_arg, memory_arg) = (cpu.to_string(), memory.to_string());
        let args = [name, "--cpu", cpu_arg.as_str(), "--memory", memory_arg.as_str()];
        match self.run_tool(&host, "set", &args).await {
            Ok(result) if result.success() => {}
            Ok(result) => warn!(host = %host.name, "配置虚拟机 {} 资源失败: {}", name, failure_message(&result)),
            Err(e) => warn!(host = %host.name, "配置虚拟机 {} 资源失败: {}", name, e),
        }

        vm.cpu = Some(cpu);
        vm.memory = Some(memory);
        vm.disk = Some(disk);
        vm.source_image = Some(source_image.to_string());

        info!(host = %host.name, "已创建虚拟机 {}", name);
        Ok(vm)
    }

    /// 查询虚拟机 IP，获取失败时返回 `None`
    pub async fn ip(&self, name: &str, host_name: &str) -> Result<Option<String>> {
        let host = self.host(host_name)?;
        let result = self.run_tool(&host, "ip", &[name]).await?;

        if !result.success() {
            if is_not_found(result.stderr()) {
                return Err(Error::vm_not_found(name, &host.name));
            }
            warn!(host = %host.name, "获取虚拟机 {} 的 IP 失败: {}", name, failure_message(&result));
            return Ok(None);
        }

        let ip = result.stdout().trim();
        if is_placeholder(ip) {
            return Ok(None);
        }
        Ok(Some(ip.to_string()))
    }

    /// 批量启动匹配的虚拟机，已在运行的直接跳过
    pub async fn batch_start(&self, pattern: &str, host_filter: Option<&str>) -> Result<Vec<BatchOutcome>> {
        let vms = self.list(host_filter, Some(pattern)).await?;

        let outcomes = join_all(vms.iter().map(|vm| async move {
            if vm.state == VmState::Running {
                return BatchOutcome::succeeded(vm, "已在运行");
            }
            match self.start(&vm.name, &vm.host).await {
                Ok(_) => BatchOutcome::succeeded(vm, "已启动"),
                Err(e) => BatchOutcome::failed(vm, &e),
            }
        }))
        .await;

        Ok(outcomes)
    }

    /// 批量停止匹配的虚拟机，已停止的直接跳过
    pub async fn batch_stop(
        &self,
        pattern: &str,
        host_filter: Option<&str>,
        force: bool,
    ) -> Result<Vec<BatchOutcome>> {
        let vms = self.list(host_filter, Some(pattern)).await?;

        let outcomes = join_all(vms.iter().map(|vm| async move {
            if vm.state == VmState::Stopped {
                return BatchOutcome::succeeded(vm, "已处于停止状态");
            }
            match self.stop(&vm.name, &vm.host, force).await {
                Ok(_) => BatchOutcome::succeeded(vm, "已停止"),
                Err(e) => BatchOutcome::failed(vm, &e),
            }
        }))
        .await;

        Ok(outcomes)
    }

    /// 关闭所有远程连接
    pub async fn close(&self) {
        self.runner.close_all().await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Response = std::result::Result<(i32, &'static str, &'static str), fn(&Host) -> Error>;

    /// 按命令返回预设结果，未预设的命令返回空输出
    #[derive(Default)]
    pub(crate) struct FakeRunner {
        responses: Mutex<HashMap<(String, String), Response>>,
        calls: Mutex<Vec<(String, String)>>,
        pub(crate) passwords: Mutex<Vec<String>>,
        closed: Mutex<bool>,
    }

    impl FakeRunner {
        fn respond(&self, host: &str, command: &str, response: Response) {
            self.responses
                .lock()
                .unwrap()
                .insert((host.to_string(), command.to_string()), response);
        }

        pub(crate) fn ok(&self, host: &str, command: &str, stdout: &'static str) {
            self.respond(host, command, Ok((0, stdout, "")));
        }

        fn fail(&self, host: &str, command: &str, exit_code: i32, stderr: &'static str) {
            self.respond(host, command, Ok((exit_code, "", stderr)));
        }

        pub(crate) fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn commands(&self) -> Vec<String> {
            self.calls().into_iter().map(|(_, c)| c).collect()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, host: &Host, command: &str, options: &RunOptions) -> Result<RemoteCommandResult> {
            if options.dry_run {
                return Ok(RemoteCommandResult::new(&host.name, command, DRY_RUN_SENTINEL, "", 0));
            }

            self.calls
                .lock()
                .unwrap()
                .push((host.name.clone(), command.to_string()));
            if let Some(credential) = &options.credential {
                self.passwords
                    .lock()
                    .unwrap()
                    .push(credential.secret().to_string());
            }

            let response = self
                .responses
                .lock()
                .unwrap()
                .get(&(host.name.clone(), command.to_string()))
                .cloned();

            match response {
                Some(Ok((code, stdout, stderr))) => {
                    Ok(RemoteCommandResult::new(&host.name, command, stdout, stderr, code))
                }
                Some(Err(make_error)) => Err(make_error(host)),
                None => Ok(RemoteCommandResult::new(&host.name, command, "", "", 0)),
            }
        }

        async fn test_connection(&self, _host: &Host, _credential: Option<&Credential>) -> (bool, String) {
            (true, "ok".to_string())
        }

        async fn active_connections(&self) -> Vec<String> {
            Vec::new()
        }

        async fn close_all(&self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    struct StaticHosts(Vec<Host>);

    impl HostRegistry for StaticHosts {
        fn resolve(&self, name: &str) -> Option<Host> {
            self.0.iter().find(|h| h.name == name).cloned()
        }

        fn all(&self) -> Vec<Host> {
            self.0.clone()
        }
    }

    const LIST: &str = "tart list --format json";

    fn service(runner: Arc<FakeRunner>) -> VmService {
        let hosts = StaticHosts(vec![Host::new("A", "10.0.0.1"), Host::new("B", "10.0.0.2")]);
        VmService::new(runner, Arc::new(hosts), DefaultsConfig::default())
    }

    fn refused(host: &Host) -> Error {
        Error::SshConnection {
            host: host.hostname.clone(),
            message: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_tool_command_quotes_arguments() {
        assert_eq!(tool_command("list", &["--format", "json"]), LIST);
        assert_eq!(
            tool_command("run", &["my vm", "--no-graphics"]),
            "tart run 'my vm' --no-graphics"
        );
    }

    #[test]
    fn test_not_found_heuristic() {
        assert!(is_not_found("VM not found"));
        assert!(is_not_found("Error: Virtual machine NOT FOUND"));
        assert!(!is_not_found("permission denied"));
    }

    #[test]
    fn test_parse_listing_placeholders() {
        assert!(parse_listing("A", "").is_empty());
        assert!(parse_listing("A", DRY_RUN_SENTINEL).is_empty());
        assert!(parse_listing("A", "not json").is_empty());
        assert!(parse_listing("A", "[]").is_empty());
    }

    #[tokio::test]
    async fn test_list_single_host() {
        let runner = Arc::new(FakeRunner::default());
        runner.ok("A", LIST, r#"[{"Name":"vm-1","State":"running","CPU":4,"Memory":8192}]"#);
        let service = service(runner.clone());

        let vms = service.list(Some("A"), None).await.unwrap();

        assert_eq!(vms.len(), 1);
        let vm = &vms[0];
        assert_eq!(vm.name, "vm-1");
        assert_eq!(vm.host, "A");
        assert_eq!(vm.state, VmState::Running);
        assert_eq!(vm.cpu, Some(4));
        assert_eq!(vm.memory, Some(8192));
        assert_eq!(vm.ip_address, None);
        assert_eq!(runner.calls(), vec![("A".to_string(), LIST.to_string())]);
    }

    #[tokio::test]
    async fn test_list_pattern_filters_by_name() {
        let runner = Arc::new(FakeRunner::default());
        runner.ok(
            "A",
            LIST,
            r#"[{"Name":"test-1","State":"running"},{"Name":"builder-1","State":"running"}]"#,
        );
        runner.ok("B", LIST, r#"[{"Name":"test-2","State":"stopped"}]"#);
        let service = service(runner);

        let vms = service.list(None, Some("test-*")).await.unwrap();
        let mut names: Vec<_> = vms.iter().map(|vm| vm.name.as_str()).collect();
        names.sort();

        assert_eq!(names, vec!["test-1", "test-2"]);
    }

    #[tokio::test]
    async fn test_list_swallows_host_failures() {
        let runner = Arc::new(FakeRunner::default());
        runner.respond("A", LIST, Err(refused));
        runner.ok("B", LIST, r#"[{"Name":"vm-2","State":"stopped"}]"#);
        let service = service(runner.clone());

        let vms = service.list(None, None).await.unwrap();
        assert_eq!(vms.len(), 1);
        assert_eq!(vms[0].host, "B");

        runner.fail("B", LIST, 1, "tart: command not found");
        assert!(service.list(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_unknown_host() {
        let service = service(Arc::new(FakeRunner::default()));

        let err = service.list(Some("missing"), None).await.unwrap_err();
        assert!(matches!(err, Error::HostNotFound(name) if name == "missing"));

        let err = service.list(None, Some("[")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_stop_not_found() {
        let runner = Arc::new(FakeRunner::default());
        runner.fail("A", "tart stop vm-1 --force", 1, "VM not found");
        let service = service(runner);

        let err = service.stop("vm-1", "A", true).await.unwrap_err();

        match err {
            Error::VmNotFound { vm_name, host } => {
                assert_eq!(vm_name, "vm-1");
                assert_eq!(host.as_deref(), Some("A"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_failure_carries_context() {
        let runner = Arc::new(FakeRunner::default());
        runner.fail("A", "tart stop vm-1", 2, "");
        let service = service(runner);

        let err = service.stop("vm-1", "A", false).await.unwrap_err();

        match err {
            Error::VmOperation {
                vm_name,
                operation,
                host,
                message,
            } => {
                assert_eq!(vm_name, "vm-1");
                assert_eq!(operation, VmOperationKind::Stop);
                assert_eq!(host.as_deref(), Some("A"));
                assert_eq!(message, "exit code 2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_returns_stopped_without_requery() {
        let runner = Arc::new(FakeRunner::default());
        let service = service(runner.clone());

        let vm = service.stop("vm-1", "A", false).await.unwrap();

        assert_eq!(vm.state, VmState::Stopped);
        assert_eq!(runner.commands(), vec!["tart stop vm-1"]);
    }

    #[tokio::test]
    async fn test_start_falls_back_to_starting() {
        let runner = Arc::new(FakeRunner::default());
        runner.ok("A", LIST, "[]");
        let service = service(runner.clone());

        let vm = service.start("vm-1", "A").await.unwrap();

        assert_eq!(vm.name, "vm-1");
        assert_eq!(vm.host, "A");
        assert_eq!(vm.state, VmState::Starting);
        assert_eq!(runner.commands(), vec!["tart run vm-1 --no-graphics", LIST]);
    }

    #[tokio::test]
    async fn test_start_refreshes_status() {
        let runner = Arc::new(FakeRunner::default());
        runner.ok("A", LIST, r#"[{"Name":"vm-1","State":"running","CPU":2}]"#);
        let service = service(runner);

        let vm = service.start("vm-1", "A").await.unwrap();

        assert_eq!(vm.state, VmState::Running);
        assert_eq!(vm.cpu, Some(2));
    }

    #[tokio::test]
    async fn test_start_survives_refresh_failure() {
        let runner = Arc::new(FakeRunner::default());
        runner.respond("A", LIST, Err(refused));
        let service = service(runner);

        let vm = service.start("vm-1", "A").await.unwrap();
        assert_eq!(vm.state, VmState::Starting);
    }

    #[tokio::test]
    async fn test_delete() {
        let runner = Arc::new(FakeRunner::default());
        runner.fail("A", "tart delete ghost", 1, "Error: VM 'ghost' not found");
        let service = service(runner);

        assert!(service.delete("vm-1", "A").await.unwrap());
        assert!(matches!(
            service.delete("ghost", "A").await,
            Err(Error::VmNotFound { .. })
        ));
        assert!(matches!(
            service.delete("vm-1", "missing").await,
            Err(Error::HostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clone_failure_is_operation_error() {
        let runner = Arc::new(FakeRunner::default());
        runner.fail("A", "tart clone base vm-2", 1, "image not found");
        let service = service(runner);

        let err = service.clone("base", "vm-2", "A").await.unwrap_err();
        assert!(matches!(
            err,
            Error::VmOperation {
                operation: VmOperationKind::Clone,
                ..
            }
        ));

        let vm = service.clone("base", "vm-3", "A").await.unwrap();
        assert_eq!(vm.state, VmState::Stopped);
        assert_eq!(vm.name, "vm-3");
    }

    #[tokio::test]
    async fn test_create_keeps_requested_resources_when_set_fails() {
        let runner = Arc::new(FakeRunner::default());
        runner.fail("A", "tart set vm-1 --cpu 8 --memory 8192", 1, "set failed");
        let service = service(runner.clone());

        let vm = service
            .create("vm-1", "A", "ghcr.io/cirruslabs/macos:latest", Some(8), None, None)
            .await
            .unwrap();

        assert_eq!(vm.state, VmState::Stopped);
        assert_eq!(vm.cpu, Some(8));
        assert_eq!(vm.memory, Some(8192));
        assert_eq!(vm.disk, Some(50));
        assert_eq!(vm.source_image.as_deref(), Some("ghcr.io/cirruslabs/macos:latest"));
        assert_eq!(
            runner.commands(),
            vec![
                "tart clone ghcr.io/cirruslabs/macos:latest vm-1",
                "tart set vm-1 --cpu 8 --memory 8192",
            ]
        );
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_resources() {
        let runner = Arc::new(FakeRunner::default());
        let service = service(runner.clone());

        let err = service
            .create("vm-1", "A", "base", None, Some(256), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ip() {
        let runner = Arc::new(FakeRunner::default());
        runner.ok("A", "tart ip vm-1", "192.168.64.5\n");
        runner.fail("A", "tart ip vm-2", 1, "no IP yet");
        runner.fail("A", "tart ip ghost", 1, "VM not found");
        let service = service(runner);

        assert_eq!(
            service.ip("vm-1", "A").await.unwrap().as_deref(),
            Some("192.168.64.5")
        );
        assert_eq!(service.ip("vm-2", "A").await.unwrap(), None);
        assert!(matches!(
            service.ip("ghost", "A").await,
            Err(Error::VmNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_batch_start_collects_each_outcome() {
        let runner = Arc::new(FakeRunner::default());
        runner.ok(
            "A",
            LIST,
            r#"[{"Name":"ci-1","State":"running"},{"Name":"ci-2","State":"stopped"},{"Name":"ci-3","State":"stopped"},{"Name":"other","State":"stopped"}]"#,
        );
        runner.fail("A", "tart run ci-3 --no-graphics", 1, "boot failure");
        let service = service(runner.clone());

        let outcomes = service.batch_start("ci-*", Some("A")).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        let by_name: HashMap<_, _> = outcomes
            .iter()
            .map(|o| (o.name.as_str(), (o.success, o.message.as_str())))
            .collect();
        assert_eq!(by_name["ci-1"], (true, "已在运行"));
        assert_eq!(by_name["ci-2"], (true, "已启动"));
        assert!(!by_name["ci-3"].0);
        assert!(by_name["ci-3"].1.contains("boot failure"));

        let commands = runner.commands();
        assert!(!commands.contains(&"tart run ci-1 --no-graphics".to_string()));
        assert!(!commands.contains(&"tart run other --no-graphics".to_string()));
    }

    #[tokio::test]
    async fn test_batch_stop_across_hosts() {
        let runner = Arc::new(FakeRunner::default());
        runner.ok("A", LIST, r#"[{"Name":"ci-1","State":"running"},{"Name":"ci-2","State":"stopped"}]"#);
        runner.ok("B", LIST, r#"[{"Name":"ci-3","State":"running"}]"#);
        runner.fail("B", "tart stop ci-3 --force", 1, "VM not found");
        let service = service(runner.clone());

        let outcomes = service.batch_stop("ci-*", None, true).await.unwrap();

        let summary: Vec<_> = outcomes
            .iter()
            .map(|o| (o.name.as_str(), o.host.as_str(), o.success))
            .collect();
        assert_eq!(
            summary,
            vec![("ci-1", "A", true), ("ci-2", "A", true), ("ci-3", "B", false)]
        );
        assert_eq!(outcomes[1].message, "已处于停止状态");
    }

    #[tokio::test]
    async fn test_dry_run_issues_no_commands() {
        let runner = Arc::new(FakeRunner::default());
        let service = service(runner.clone()).with_dry_run(true);

        assert!(service.is_dry_run());
        assert!(service.list(None, None).await.unwrap().is_empty());
        assert_eq!(service.ip("vm-1", "A").await.unwrap(), None);

        let vm = service.start("vm-1", "A").await.unwrap();
        assert_eq!(vm.state, VmState::Starting);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_credential_is_passed_to_runner() {
        let runner = Arc::new(FakeRunner::default());
        let service = service(runner.clone()).with_credential(Some(Credential::password("s3cret")));

        service.stop("vm-1", "A", false).await.unwrap();

        assert_eq!(*runner.passwords.lock().unwrap(), vec!["s3cret"]);
    }

    #[tokio::test]
    async fn test_close_delegates_to_runner() {
        let runner = Arc::new(FakeRunner::default());
        let service = service(runner.clone());

        service.close().await;
        assert!(*runner.closed.lock().unwrap());
    }
}
