/// 工具函数集合

pub mod retry;

use nu_glob::Pattern;
use std::path::PathBuf;

use crate::errors::{Error, Result};

/// 虚拟机名称通配模式（`*`、`?`、`[...]`）
#[derive(Debug, Clone)]
pub struct NamePattern {
    pattern: Pattern,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern)
            .map_err(|e| Error::InvalidArgument(format!("无效的名称模式 '{}': {}", pattern, e)))?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.matches(name)
    }
}

/// 展开路径开头的 `~`
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// 当前本地用户名
pub fn local_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "root".to_string())
}
