//! Write file tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::error::ToolError;
use crate::tools::{Tool, ToolOutput};

use super::resolve_path;

/// Tool for writing file contents. Always passes through the approval gate.
pub struct WriteFile {
    root: PathBuf,
}

impl WriteFile {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it if needed and replacing any existing content."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to write (relative to the workspace root)"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let path_str = params["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("path is required".into()))?;
        let content = params["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("content is required".into()))?;

        let path = resolve_path(&self.root, path_str);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(ToolError::Io)?;
        }
        tokio::fs::write(&path, content).await.map_err(ToolError::Io)?;

        Ok(ToolOutput::success(json!({
            "path": path.display().to_string(),
            "bytes_written": content.len()
        })))
    }

    fn requires_approval(&self, _params: &Value) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFile::new(dir.path());
        let out = tool
            .execute(json!({"path": "notes/a.txt", "content": "hello"}))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes/a.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_write_is_gated() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFile::new(dir.path());
        assert!(tool.requires_approval(&json!({"path": "a.txt", "content": "x"})));
    }
}
