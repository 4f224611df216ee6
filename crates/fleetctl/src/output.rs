/// 输出格式化
///
/// 支持表格、JSON、YAML 三种格式

use anyhow::Result;
use clap::ValueEnum;
use cli_table::{Cell, Style, Table};
use common::{Host, Vm};
use serde::Serialize;

use crate::services::BatchOutcome;

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

/// 可以按表格展示的类型
pub trait Tabular: Serialize {
    fn headers() -> Vec<&'static str>;

    fn row(&self) -> Vec<String>;

    /// 单条记录的纵向展示：字段名与值
    fn details(&self) -> Vec<(&'static str, String)> {
        Self::headers().into_iter().zip(self.row()).collect()
    }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

impl Tabular for Vm {
    fn headers() -> Vec<&'static str> {
        vec!["NAME", "HOST", "STATUS", "CPU", "MEMORY", "DISK", "IP"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.host.clone(),
            self.status_display(),
            or_dash(self.cpu),
            self.memory_display(),
            self.disk.map(|d| format!("{} GB", d)).unwrap_or_else(|| "-".to_string()),
            or_dash(self.ip_address.as_deref()),
        ]
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        let mut details: Vec<_> = Self::headers().into_iter().zip(self.row()).collect();
        details.push(("SOURCE", or_dash(self.source_image.as_deref())));
        details
    }
}

impl Tabular for Host {
    fn headers() -> Vec<&'static str> {
        vec!["NAME", "HOSTNAME", "USERNAME", "PORT", "SSH KEY"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.hostname.clone(),
            self.effective_username(),
            self.port.to_string(),
            or_dash(self.ssh_key.as_deref()),
        ]
    }
}

impl Tabular for BatchOutcome {
    fn headers() -> Vec<&'static str> {
        vec!["VM", "HOST", "RESULT", "MESSAGE"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.host.clone(),
            if self.success { "✓" } else { "✗" }.to_string(),
            self.message.clone(),
        ]
    }
}

fn render_table(headers: &[&str], rows: Vec<Vec<String>>) -> Result<String> {
    let table = rows
        .into_iter()
        .map(|row| row.into_iter().map(|value| value.cell()).collect::<Vec<_>>())
        .collect::<Vec<_>>()
        .table()
        .title(headers.iter().map(|h| h.cell().bold(true)).collect::<Vec<_>>());

    Ok(table.display()?.to_string())
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn to_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_yaml::to_string(value)?.trim_end().to_string())
}

/// 渲染列表
pub fn render_list<T: Tabular>(items: &[T], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => render_table(
            &T::headers(),
            items.iter().map(Tabular::row).collect(),
        ),
        OutputFormat::Json => to_json(items),
        OutputFormat::Yaml => to_yaml(items),
    }
}

/// 渲染单条记录
pub fn render_item<T: Tabular>(item: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => {
            let rows = item
                .details()
                .into_iter()
                .map(|(field, value)| vec![field.to_string(), value])
                .collect();
            render_table(&["FIELD", "VALUE"], rows)
        }
        OutputFormat::Json => to_json(item),
        OutputFormat::Yaml => to_yaml(item),
    }
}

/// 渲染任意可序列化的值，表格格式回退为 YAML
pub fn render_value<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(value),
        OutputFormat::Table | OutputFormat::Yaml => to_yaml(value),
    }
}
