//! Task-store tools
//!
//! The task store is an external CLI treated as a black box: these tools
//! shell out to it and hand its output back to the model verbatim. Creating
//! a work item does not act on it, so all three are safe.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::ToolError;
use crate::tools::{Tool, ToolOutput};

async fn run_todo(bin: &str, args: &[&str]) -> Result<ToolOutput, ToolError> {
    let output = Command::new(bin)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("failed to run {}: {}", bin, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if output.status.success() {
        Ok(ToolOutput::success(json!({ "output": stdout })))
    } else {
        Ok(ToolOutput {
            success: false,
            content: json!({ "output": stdout, "stderr": stderr }),
            error: Some(format!(
                "{} exited with {:?}",
                bin,
                output.status.code()
            )),
        })
    }
}

/// Query the external task store
pub struct QueryTasks {
    bin: String,
}

impl QueryTasks {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl Tool for QueryTasks {
    fn name(&self) -> &str {
        "query_tasks"
    }

    fn description(&self) -> &str {
        "Query the task store. Pass a query expression understood by the task CLI."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Query expression, e.g. 'status:open assignee:executor'"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let query = params["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("query is required".into()))?;
        run_todo(&self.bin, &["query", query]).await
    }
}

/// Create a work item in the task store
pub struct CreateTask {
    bin: String,
}

impl CreateTask {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl Tool for CreateTask {
    fn name(&self) -> &str {
        "create_task"
    }

    fn description(&self) -> &str {
        "Create a task in the task store. This records the work item; it does not act on it."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Task title" },
                "priority": { "type": "string", "description": "Priority, e.g. high/medium/low" },
                "stakeholders": { "type": "string", "description": "Comma-separated stakeholders" },
                "tags": { "type": "string", "description": "Optional comma-separated tags" },
                "prompt": { "type": "string", "description": "Optional task prompt for the assignee" }
            },
            "required": ["title", "priority", "stakeholders"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let title = params["title"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("title is required".into()))?;
        let priority = params["priority"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("priority is required".into()))?;
        let stakeholders = params["stakeholders"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("stakeholders is required".into()))?;

        let mut args = vec![
            "create",
            title,
            "--priority",
            priority,
            "--stakeholders",
            stakeholders,
        ];
        if let Some(tags) = params["tags"].as_str() {
            args.push("--tags");
            args.push(tags);
        }
        if let Some(prompt) = params["prompt"].as_str() {
            args.push("--prompt");
            args.push(prompt);
        }
        run_todo(&self.bin, &args).await
    }
}

/// Update work items matching a query
pub struct UpdateTask {
    bin: String,
}

impl UpdateTask {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl Tool for UpdateTask {
    fn name(&self) -> &str {
        "update_task"
    }

    fn description(&self) -> &str {
        "Update tasks in the task store. Pass an update expression understood by the task CLI."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Update expression, e.g. 'id:42 set status:done'"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let query = params["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("query is required".into()))?;
        run_todo(&self.bin, &["update", query]).await
    }
}
