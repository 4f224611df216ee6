/// 远程命令执行结果

use serde::Serialize;

use crate::session::RawOutput;

/// 一次远程命令执行的结果，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteCommandResult {
    stdout: String,
    stderr: String,
    exit_code: i32,
    host: String,
    command: String,
}

impl RemoteCommandResult {
    /// stdout/stderr 会去掉首尾空白
    pub fn new(
        host: impl Into<String>,
        command: impl Into<String>,
        stdout: &str,
        stderr: &str,
        exit_code: i32,
    ) -> Self {
        Self {
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
            exit_code,
            host: host.into(),
            command: command.into(),
        }
    }

    /// 按 UTF-8 解码原始输出，非法字节替换为 U+FFFD
    pub fn from_raw(host: impl Into<String>, command: impl Into<String>, raw: RawOutput) -> Self {
        let stdout = String::from_utf8_lossy(&raw.stdout);
        let stderr = String::from_utf8_lossy(&raw.stderr);
        Self::new(host, command, &stdout, &stderr, raw.exit_code)
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout 与 stderr 按行拼接，空的部分省略
    pub fn output(&self) -> String {
        [self.stdout.as_str(), self.stderr.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n")
    }
}
