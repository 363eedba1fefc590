//! List directory tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::error::ToolError;
use crate::tools::{Tool, ToolOutput};

use super::resolve_path;

/// Tool for listing directory entries
pub struct ListDirectory {
    root: PathBuf,
}

impl ListDirectory {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ListDirectory {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Directories are suffixed with '/'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (relative to the workspace root)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let path_str = params["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("path is required".into()))?;

        let path = resolve_path(&self.root, path_str);
        let mut reader = tokio::fs::read_dir(&path).await.map_err(ToolError::Io)?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(ToolError::Io)? {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(if is_dir { format!("{}/", name) } else { name });
        }
        entries.sort();

        Ok(ToolOutput::success(json!({
            "path": path.display().to_string(),
            "entries": entries
        })))
    }
}
