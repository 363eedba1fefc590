//! Message log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

/// A tool invocation requested by the model.
///
/// Arguments are stored structured; they are only re-serialized to a JSON
/// string when transmitted to the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry in a session's ordered message log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    /// May be empty when tool_calls are present
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Only for role=tool_result, referring back to the assistant's call id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Structured executor return, only for role=tool_result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            result: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            result: None,
        }
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
            result: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, result: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            role: Role::ToolResult,
            content: String::new(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
            result: Some(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_serialization() {
        let yaml = serde_yml::to_string(&Role::ToolResult).unwrap();
        assert_eq!(yaml.trim(), "tool_result");
        let role: Role = serde_yml::from_str("assistant").unwrap();
        assert_eq!(role, Role::Assistant);
    }

    #[test]
    fn test_message_round_trip() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: "read_file".to_string(),
                arguments: json!({"path": "memo.txt"}),
            }],
        );
        let yaml = serde_yml::to_string(&msg).unwrap();
        let back: Message = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(back.role, Role::Assistant);
        assert_eq!(back.tool_calls.len(), 1);
        assert_eq!(back.tool_calls[0].arguments["path"], "memo.txt");
    }

    #[test]
    fn test_tool_result_carries_call_id() {
        let msg = Message::tool_result("call_9", json!({"success": true}));
        assert_eq!(msg.role, Role::ToolResult);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_9"));
        assert!(msg.result.unwrap()["success"].as_bool().unwrap());
    }

    #[test]
    fn test_optional_fields_omitted_in_yaml() {
        let yaml = serde_yml::to_string(&Message::user("hi")).unwrap();
        assert!(!yaml.contains("tool_calls"));
        assert!(!yaml.contains("tool_call_id"));
        assert!(!yaml.contains("result"));
    }
}
