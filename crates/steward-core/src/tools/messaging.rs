//! Inter-agent and external messaging tools
//!
//! `send_message` is pure: it returns a routing intent and the orchestrator
//! performs the cross-session append. The slack pair is backed by the
//! append-only jsonl files under `inbox/`.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::io::Write;

use crate::config::Layout;
use crate::error::ToolError;
use crate::tools::{Tool, ToolOutput};

/// Intent marker recognized by the dispatcher
pub const ROUTE_MESSAGE_INTENT: &str = "route_message";

/// Deliver a message to another agent's session
pub struct SendMessage;

impl SendMessage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SendMessage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SendMessage {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Send a message to another agent. The message is appended to that agent's session as user input."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_id": {
                    "type": "string",
                    "description": "Target agent or session id"
                },
                "content": {
                    "type": "string",
                    "description": "Message content to deliver"
                }
            },
            "required": ["agent_id", "content"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let agent_id = params["agent_id"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("agent_id is required".into()))?;
        let content = params["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("content is required".into()))?;

        // The append itself is the orchestrator's privilege
        Ok(ToolOutput::success(json!({
            "intent": ROUTE_MESSAGE_INTENT,
            "target": agent_id,
            "content": content,
        })))
    }
}

/// Post a message to an external channel (outbound, gated)
pub struct SlackSend {
    layout: Layout,
}

impl SlackSend {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl Tool for SlackSend {
    fn name(&self) -> &str {
        "slack_send"
    }

    fn description(&self) -> &str {
        "Send a message to an external chat channel."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": { "type": "string", "description": "Channel name" },
                "message": { "type": "string", "description": "Message text" }
            },
            "required": ["channel", "message"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let channel = params["channel"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("channel is required".into()))?;
        let message = params["message"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("message is required".into()))?;

        let path = self.layout.outbox_file(channel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ToolError::Io)?;
        }
        let line = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "channel": channel,
            "message": message,
        });
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(ToolError::Io)?;
        writeln!(file, "{}", line).map_err(ToolError::Io)?;

        Ok(ToolOutput::success(json!({
            "channel": channel,
            "queued": true,
        })))
    }

    fn requires_approval(&self, _params: &Value) -> bool {
        true
    }
}

/// Read recent messages from an external channel's inbox
pub struct SlackRead {
    layout: Layout,
    default_channel: String,
}

impl SlackRead {
    pub fn new(layout: Layout, default_channel: impl Into<String>) -> Self {
        Self {
            layout,
            default_channel: default_channel.into(),
        }
    }
}

#[async_trait]
impl Tool for SlackRead {
    fn name(&self) -> &str {
        "slack_read"
    }

    fn description(&self) -> &str {
        "Read recent messages from an external chat channel."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "description": "Max messages to return (default 20)" },
                "channel": { "type": "string", "description": "Channel name (defaults to the configured channel)" }
            },
            "required": []
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let limit = params["limit"].as_u64().unwrap_or(20) as usize;
        let channel = params["channel"]
            .as_str()
            .unwrap_or(&self.default_channel)
            .to_string();

        let path = self.layout.inbox_file(&channel);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(ToolError::Io(e)),
        };

        let mut messages: Vec<Value> = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(value) => messages.push(value),
                Err(_) => messages.push(json!({ "raw": line })),
            }
        }
        let start = messages.len().saturating_sub(limit);
        let recent: Vec<Value> = messages[start..].to_vec();

        Ok(ToolOutput::success(json!({
            "channel": channel,
            "messages": recent,
        })))
    }
}
