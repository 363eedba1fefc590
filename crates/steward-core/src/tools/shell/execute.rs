//! Execute command tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::config::defaults;
use crate::error::ToolError;
use crate::tools::{Tool, ToolOutput};

use super::ShellAllowlist;

/// Tool for executing shell commands.
///
/// Gated unless the command matches the allowlist.
pub struct ExecuteCommand {
    root: PathBuf,
    allowlist: Arc<ShellAllowlist>,
    timeout_secs: u64,
}

impl ExecuteCommand {
    pub fn new(root: impl AsRef<Path>, allowlist: Arc<ShellAllowlist>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            allowlist,
            timeout_secs: defaults::COMMAND_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[async_trait]
impl Tool for ExecuteCommand {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Commands outside the allowlist require operator approval."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory for the command (relative to the workspace root)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let command = params["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("command is required".into()))?;

        let cwd = match params["cwd"].as_str() {
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        };

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&cwd)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output(),
        )
        .await
        .map_err(|_| {
            ToolError::ExecutionFailed(format!("command timed out after {}s", self.timeout_secs))
        })?
        .map_err(ToolError::Io)?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok(ToolOutput {
            success: output.status.success(),
            content: json!({
                "exit_code": output.status.code(),
                "stdout": stdout,
                "stderr": stderr,
            }),
            error: if output.status.success() {
                None
            } else {
                Some(format!("command exited with {:?}", output.status.code()))
            },
        })
    }

    /// Allowlisted commands run without the gate; everything else waits for
    /// an operator decision.
    fn requires_approval(&self, params: &Value) -> bool {
        match params["command"].as_str() {
            Some(command) => !self.allowlist.matches(command),
            None => true,
        }
    }
}
