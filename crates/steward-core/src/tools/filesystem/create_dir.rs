//! Create directory tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::error::ToolError;
use crate::tools::{Tool, ToolOutput};

use super::resolve_path;

/// Tool for creating directories (with parents)
pub struct CreateDirectory {
    root: PathBuf,
}

impl CreateDirectory {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for CreateDirectory {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn description(&self) -> &str {
        "Create a directory, including any missing parent directories."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to create (relative to the workspace root)"
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
        tokio::fs::create_dir_all(&path).await.map_err(ToolError::Io)?;

        Ok(ToolOutput::success(json!({
            "path": path.display().to_string(),
            "created": true
        })))
    }
}
