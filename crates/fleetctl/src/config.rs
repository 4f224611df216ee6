/// 配置管理
///
/// 配置文件为 YAML，默认位于 `~/.fleetctl/config.yaml`，可由 `FLEETCTL_CONFIG`
/// 或 `--config` 覆盖。`FLEETCTL_` 前缀的环境变量可覆盖单个字段，
/// 例如 `FLEETCTL_DEFAULTS__TIMEOUT=60`

use common::models::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_OPERATION_TIMEOUT, DEFAULT_POOL_MAX_AGE, DEFAULT_VM_CPU,
    DEFAULT_VM_DISK, DEFAULT_VM_MEMORY,
};
use common::{Error, Host, HostRegistry, Result, RetryPolicy};
use remote::PoolSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// 配置文件路径环境变量
pub const CONFIG_ENV: &str = "FLEETCTL_CONFIG";

const ENV_PREFIX: &str = "FLEETCTL";

const LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fleetctl")
}

/// 默认配置文件路径
pub fn default_config_path() -> PathBuf {
    app_dir().join("config.yaml")
}

/// 默认日志文件路径
pub fn default_log_path() -> PathBuf {
    app_dir().join("fleetctl.log")
}

/// 按优先级解析配置文件路径：参数 > 环境变量 > 默认路径
pub fn resolve_config_path(path: Option<PathBuf>) -> PathBuf {
    path.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + Display,
{
    if value < min || value > max {
        return Err(Error::Config(format!(
            "{} 超出范围: {} (应为 {}-{})",
            field, value, min, max
        )));
    }
    Ok(())
}

/// 新建虚拟机的默认参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DefaultsConfig {
    pub vm_cpu: u32,
    /// 内存（MB）
    pub vm_memory: u32,
    /// 磁盘（GB）
    pub vm_disk: u32,
    /// 远程命令超时（秒）
    pub timeout: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            vm_cpu: DEFAULT_VM_CPU,
            vm_memory: DEFAULT_VM_MEMORY,
            vm_disk: DEFAULT_VM_DISK,
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl DefaultsConfig {
    pub fn validate(&self) -> Result<()> {
        check_range("defaults.vm_cpu", self.vm_cpu, 1, 64)?;
        check_range("defaults.vm_memory", self.vm_memory, 512, 131_072)?;
        check_range("defaults.vm_disk", self.vm_disk, 10, 2048)?;
        check_range("defaults.timeout", self.timeout, 10, 3600)?;
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// SSH 连接池与重试参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SshConfig {
    /// 连接超时（秒）
    pub connect_timeout: u64,
    /// 会话最大存活时间（秒）
    pub pool_max_age: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pool_max_age: DEFAULT_POOL_MAX_AGE,
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl SshConfig {
    pub fn validate(&self) -> Result<()> {
        check_range("ssh.connect_timeout", self.connect_timeout, 1, 600)?;
        check_range("ssh.pool_max_age", self.pool_max_age, 1, 86_400)?;
        check_range("ssh.max_attempts", self.max_attempts, 1, 10)?;
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(format!(
                "ssh.base_delay_ms ({}) 不能大于 ssh.max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_age: Duration::from_secs(self.pool_max_age),
            connect_timeout: Duration::from_secs(self.connect_timeout),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::connection_errors(self.max_attempts).with_delays(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// DEBUG / INFO / WARNING / ERROR / CRITICAL
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// 校验并将级别统一为大写
    pub fn normalize(&mut self) -> Result<()> {
        let level = self.level.trim().to_uppercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(Error::Config(format!(
                "无效的日志级别: {} (可选: {})",
                self.level,
                LOG_LEVELS.join(", ")
            )));
        }
        self.level = level;
        Ok(())
    }

    /// 对应的 tracing 过滤级别
    pub fn filter_level(&self) -> &'static str {
        match self.level.to_uppercase().as_str() {
            "DEBUG" => "debug",
            "WARNING" => "warn",
            "ERROR" | "CRITICAL" => "error",
            _ => "info",
        }
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.file.as_deref().map(common::utils::expand_tilde)
    }
}

/// 完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub hosts: Vec<Host>,
    pub defaults: DefaultsConfig,
    pub ssh: SshConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// 校验配置，同时规范化日志级别
    pub fn validate(&mut self) -> Result<()> {
        let mut names = HashSet::new();
        for host in &self.hosts {
            host.validate()?;
            if !names.insert(host.name.as_str()) {
                return Err(Error::Config(format!("主机名称重复: {}", host.name)));
            }
        }

        self.defaults.validate()?;
        self.ssh.validate()?;
        self.logging.normalize()?;
        Ok(())
    }

    pub fn get_host(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// 示例配置
    pub fn example() -> Self {
        let builder = |name: &str, hostname: &str| {
            Host::new(name, hostname)
                .with_username("admin")
                .with_ssh_key("~/.ssh/id_rsa")
        };

        Self {
            hosts: vec![
                builder("mac-builder-1", "192.168.1.100"),
                builder("mac-builder-2", "192.168.1.101"),
            ],
            logging: LoggingConfig {
                level: "INFO".to_string(),
                file: Some(default_log_path().display().to_string()),
            },
            ..Self::default()
        }
    }
}

/// 配置管理器，同时作为主机注册表
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// 加载配置，文件不存在时使用默认配置
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = resolve_config_path(path);
        debug!("加载配置文件: {}", path.display());

        let mut config: Config = config::Config::builder()
            .add_source(
                config::File::from(path.as_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(format!("无法解析 {}: {}", path.display(), e)))?;

        config.validate()?;

        if !path.exists() {
            debug!("配置文件不存在，使用默认配置");
        }

        Ok(Self { path, config })
    }

    /// 加载必须存在的配置文件
    pub fn load_existing(path: Option<PathBuf>) -> Result<Self> {
        let path = resolve_config_path(path);
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.display().to_string()));
        }
        Self::load(Some(path))
    }

    /// 使用已有配置构造（不读取文件）
    pub fn from_config(path: impl Into<PathBuf>, mut config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            path: path.into(),
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hosts(&self) -> &[Host] {
        &self.config.hosts
    }

    pub fn get_host(&self, name: &str) -> Result<Host> {
        self.config
            .get_host(name)
            .cloned()
            .ok_or_else(|| Error::HostNotFound(name.to_string()))
    }

    /// 写回配置文件
    pub fn save(&self) -> Result<()> {
        write_yaml(&self.path, &self.config)?;
        info!("配置已保存: {}", self.path.display());
        Ok(())
    }

    /// 添加主机并保存
    pub fn add_host(&mut self, host: Host) -> Result<()> {
        host.validate()?;
        if self.config.get_host(&host.name).is_some() {
            return Err(Error::Config(format!("主机已存在: {}", host.name)));
        }

        self.config.hosts.push(host);
        self.save()
    }

    /// 删除主机并保存，返回被删除的主机
    pub fn remove_host(&mut self, name: &str) -> Result<Host> {
        let index = self
            .config
            .hosts
            .iter()
            .position(|h| h.name == name)
            .ok_or_else(|| Error::HostNotFound(name.to_string()))?;

        let host = self.config.hosts.remove(index);
        self.save()?;
        Ok(host)
    }

    /// 生成示例配置文件
    pub fn create_example(path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
        let path = resolve_config_path(path);
        if path.exists() && !force {
            return Err(Error::Config(format!(
                "配置文件已存在: {} (使用 --force 覆盖)",
                path.display()
            )));
        }

        write_yaml(&path, &Config::example())?;
        info!("已生成示例配置: {}", path.display());
        Ok(path)
    }
}

impl HostRegistry for ConfigManager {
    fn resolve(&self, name: &str) -> Option<Host> {
        self.config.get_host(name).cloned()
    }

    fn all(&self) -> Vec<Host> {
        self.config.hosts.clone()
    }
}

fn write_yaml(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_yaml::to_string(config)
        .map_err(|e| Error::Config(format!("无法序列化配置: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}
