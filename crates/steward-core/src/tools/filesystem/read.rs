//! Read file tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::error::ToolError;
use crate::tools::{Tool, ToolOutput};

use super::resolve_path;

/// Tool for reading file contents
pub struct ReadFile {
    root: PathBuf,
}

impl ReadFile {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Returns the file content as text."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to read (relative to the workspace root)"
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
        let raw = tokio::fs::read_to_string(&path).await.map_err(ToolError::Io)?;
        // Normalize line endings for downstream rendering
        let content = raw.replace("\r\n", "\n");

        Ok(ToolOutput::success(json!({
            "content": content,
            "path": path.display().to_string(),
            "size": content.len()
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_normalizes_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("memo.txt"), "a\r\nb\r\n").unwrap();

        let tool = ReadFile::new(dir.path());
        let out = tool.execute(json!({"path": "memo.txt"})).await.unwrap();
        assert!(out.success);
        assert_eq!(out.content["content"], "a\nb\n");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFile::new(dir.path());
        let result = tool.execute(json!({"path": "ghost.txt"})).await;
        assert!(matches!(result, Err(ToolError::Io(_))));
    }

    #[tokio::test]
    async fn test_read_requires_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFile::new(dir.path());
        assert!(matches!(
            tool.execute(json!({})).await,
            Err(ToolError::InvalidParams(_))
        ));
    }
}
