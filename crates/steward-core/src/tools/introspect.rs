//! Session introspection tools (intended for planner templates)
//!
//! These operate on raw session files so the planner can see exactly what a
//! human would see. `edit_session` rewrites a transcript and is gated.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::Layout;
use crate::error::ToolError;
use crate::store::{ConversationStore, SessionStatus};
use crate::tools::{Tool, ToolOutput};

fn session_file_name(raw: &str) -> String {
    if raw.ends_with(".session.yaml") {
        raw.to_string()
    } else {
        format!("{}.session.yaml", raw)
    }
}

/// List sessions currently marked active
pub struct ListActiveSessions {
    layout: Layout,
}

impl ListActiveSessions {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl Tool for ListActiveSessions {
    fn name(&self) -> &str {
        "list_active_sessions"
    }

    fn description(&self) -> &str {
        "List all currently active agent sessions with their agent id and message count."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _params: Value) -> Result<ToolOutput, ToolError> {
        let store = ConversationStore::new(self.layout.clone());
        let sessions = store
            .list_sessions()
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let active: Vec<Value> = sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .map(|s| {
                json!({
                    "session_id": s.id,
                    "agent_id": s.agent_id,
                    "messages": s.log.len(),
                    "updated_at": s.updated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                })
            })
            .collect();

        Ok(ToolOutput::success(json!({ "sessions": active })))
    }
}

/// Read a session transcript file verbatim
pub struct ReadSessionFile {
    layout: Layout,
}

impl ReadSessionFile {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl Tool for ReadSessionFile {
    fn name(&self) -> &str {
        "read_session"
    }

    fn description(&self) -> &str {
        "Read another agent's session transcript file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_file": {
                    "type": "string",
                    "description": "Session file name or session id"
                }
            },
            "required": ["session_file"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let raw_name = params["session_file"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("session_file is required".into()))?;

        let path = self.layout.sessions_dir().join(session_file_name(raw_name));
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(ToolError::Io)?
            .replace("\r\n", "\n");

        Ok(ToolOutput::success(json!({
            "path": path.display().to_string(),
            "content": content,
        })))
    }
}

/// Replace a session transcript file wholesale (gated)
pub struct EditSession {
    layout: Layout,
}

impl EditSession {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl Tool for EditSession {
    fn name(&self) -> &str {
        "edit_session"
    }

    fn description(&self) -> &str {
        "Replace the contents of another agent's session transcript file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_file": {
                    "type": "string",
                    "description": "Session file name or session id"
                },
                "new_content": {
                    "type": "string",
                    "description": "Full replacement file content"
                }
            },
            "required": ["session_file", "new_content"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let raw_name = params["session_file"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("session_file is required".into()))?;
        let new_content = params["new_content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("new_content is required".into()))?;

        let path = self.layout.sessions_dir().join(session_file_name(raw_name));
        if !path.exists() {
            return Ok(ToolOutput::error(format!(
                "session file does not exist: {}",
                path.display()
            )));
        }
        tokio::fs::write(&path, new_content).await.map_err(ToolError::Io)?;

        Ok(ToolOutput::success(json!({
            "path": path.display().to_string(),
            "bytes_written": new_content.len(),
        })))
    }

    fn requires_approval(&self, _params: &Value) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AgentType;
    use std::collections::BTreeMap;

    fn store() -> (tempfile::TempDir, Layout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        layout.ensure().unwrap();
        (dir, layout)
    }

    fn seed_session(layout: &Layout, id: &str, status: SessionStatus) {
        let template = crate::store::Template {
            id: "executor".to_string(),
            agent_type: AgentType::Executor,
            model: "gpt-4o".to_string(),
            system_prompt: "x".to_string(),
            tools: Vec::new(),
            metadata: BTreeMap::new(),
        };
        let mut session = crate::store::Session::from_template(&template, id);
        session.status = status;
        let store = ConversationStore::new(layout.clone());
        store.write_session(&mut session).unwrap();
    }

    #[tokio::test]
    async fn test_list_active_filters_status() {
        let (_dir, layout) = store();
        seed_session(&layout, "executor-a", SessionStatus::Active);
        seed_session(&layout, "executor-b", SessionStatus::Completed);

        let tool = ListActiveSessions::new(layout);
        let out = tool.execute(json!({})).await.unwrap();
        let sessions = out.content["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["session_id"], "executor-a");
    }

    #[tokio::test]
    async fn test_read_session_accepts_bare_id() {
        let (_dir, layout) = store();
        seed_session(&layout, "executor-a", SessionStatus::Active);

        let tool = ReadSessionFile::new(layout);
        let out = tool
            .execute(json!({"session_file": "executor-a"}))
            .await
            .unwrap();
        assert!(out.content["content"].as_str().unwrap().contains("executor-a"));
    }

    #[tokio::test]
    async fn test_edit_session_gated_and_requires_existing_file() {
        let (_dir, layout) = store();
        let tool = EditSession::new(layout.clone());
        assert!(tool.requires_approval(&json!({})));

        let out = tool
            .execute(json!({"session_file": "ghost", "new_content": "x"}))
            .await
            .unwrap();
        assert!(!out.success);

        seed_session(&layout, "executor-a", SessionStatus::Active);
        let out = tool
            .execute(json!({"session_file": "executor-a", "new_content": "id: executor-a\n"}))
            .await
            .unwrap();
        assert!(out.success);
    }
}
