//! Chat-completion client abstraction
//!
//! The orchestrator consumes an OpenAI-style chat endpoint: it sends
//! `{model, messages, tools, tool_choice}` and receives one assistant message
//! with text content, tool calls, or both. The wire types here are the only
//! place where tool-call arguments exist as JSON strings; everywhere else they
//! are structured values.

mod http;
mod mock;

pub use http::HttpCompletion;
pub use mock::{MockCompletion, RecordedCall};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One message in the outbound wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl WireMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// Assistant tool call on the wire: arguments are a JSON string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunction {
    pub name: String,
    pub arguments: String,
}

/// Tool declaration sent with every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// How strongly the model is steered toward calling a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    Required,
    None,
}

impl ToolChoice {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::Required => "required",
            ToolChoice::None => "none",
        }
    }
}

/// A tool call parsed out of the reply, arguments already structured
#[derive(Debug, Clone)]
pub struct ParsedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The assistant message returned by one completion round-trip
#[derive(Debug, Clone, Default)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ParsedToolCall>,
}

impl AssistantReply {
    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty()
            && self.content.as_deref().map(str::trim).unwrap_or("").is_empty()
    }
}

/// Parse tool-call arguments tolerantly: the service sends a JSON string, but
/// already-structured objects are accepted too. This is the single place that
/// branches on the two forms.
pub fn parse_arguments(raw: &Value) -> Result<Value> {
    match raw {
        Value::String(s) => {
            if s.trim().is_empty() {
                return Ok(Value::Object(serde_json::Map::new()));
            }
            serde_json::from_str(s)
                .map_err(|e| Error::Completion(format!("unparseable tool arguments: {}", e)))
        }
        other => Ok(other.clone()),
    }
}

/// The sole suspension point inside a session advancement step.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: Vec<WireMessage>,
        tools: Vec<ToolSchema>,
        tool_choice: ToolChoice,
    ) -> Result<AssistantReply>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_arguments_from_string() {
        let parsed = parse_arguments(&json!("{\"path\": \"memo.txt\"}")).unwrap();
        assert_eq!(parsed["path"], "memo.txt");
    }

    #[test]
    fn test_parse_arguments_already_structured() {
        let parsed = parse_arguments(&json!({"path": "memo.txt"})).unwrap();
        assert_eq!(parsed["path"], "memo.txt");
    }

    #[test]
    fn test_parse_arguments_empty_string() {
        let parsed = parse_arguments(&json!("")).unwrap();
        assert!(parsed.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_parse_arguments_garbage() {
        assert!(parse_arguments(&json!("{not json")).is_err());
    }

    #[test]
    fn test_wire_message_serialization_omits_empty_fields() {
        let msg = WireMessage::user("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
    }

    #[test]
    fn test_empty_reply_detection() {
        assert!(AssistantReply::default().is_empty());
        assert!(AssistantReply {
            content: Some("  ".to_string()),
            tool_calls: Vec::new(),
        }
        .is_empty());
        assert!(!AssistantReply {
            content: Some("hi".to_string()),
            tool_calls: Vec::new(),
        }
        .is_empty());
    }
}
