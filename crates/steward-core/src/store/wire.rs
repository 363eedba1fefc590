//! Outbound wire formatting for the completion service
//!
//! The log is stored with structured tool-call arguments and a `tool_result`
//! role; the completion protocol wants JSON-string arguments and a `tool`
//! role. This is the only serializer in that direction.

use crate::completion::{WireFunction, WireMessage, WireToolCall};
use crate::error::Result;

use super::message::Role;
use super::session::Session;

/// Produce the wire-format message sequence for one session: a synthetic
/// system message first, then the log with roles re-mapped.
pub fn messages_for_completion(session: &Session) -> Result<Vec<WireMessage>> {
    let mut wire = Vec::with_capacity(session.log.len() + 1);
    wire.push(WireMessage::system(session.system_prompt.clone()));

    for msg in &session.log {
        match msg.role {
            Role::User => wire.push(WireMessage::user(msg.content.clone())),
            Role::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    let mut calls = Vec::with_capacity(msg.tool_calls.len());
                    for tc in &msg.tool_calls {
                        calls.push(WireToolCall {
                            id: tc.id.clone(),
                            call_type: "function".to_string(),
                            function: WireFunction {
                                name: tc.name.clone(),
                                arguments: serde_json::to_string(&tc.arguments)?,
                            },
                        });
                    }
                    Some(calls)
                };
                wire.push(WireMessage {
                    role: "assistant".to_string(),
                    content: if msg.content.is_empty() {
                        None
                    } else {
                        Some(msg.content.clone())
                    },
                    tool_calls,
                    tool_call_id: None,
                });
            }
            Role::ToolResult => {
                let content = match &msg.result {
                    Some(result) => serde_json::to_string(result)?,
                    None => msg.content.clone(),
                };
                wire.push(WireMessage::tool(
                    msg.tool_call_id.clone().unwrap_or_default(),
                    content,
                ));
            }
        }
    }

    Ok(wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AgentType, Message, Template, ToolCallRequest};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn session_with_log(log: Vec<Message>) -> Session {
        let template = Template {
            id: "solo".to_string(),
            agent_type: AgentType::Solo,
            model: "gpt-4o".to_string(),
            system_prompt: "Be helpful.".to_string(),
            tools: Vec::new(),
            metadata: BTreeMap::new(),
        };
        let mut session = Session::from_template(&template, "solo-1");
        session.log = log;
        session
    }

    #[test]
    fn test_system_message_comes_first() {
        let wire = messages_for_completion(&session_with_log(vec![Message::user("hi")])).unwrap();
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[0].content.as_deref(), Some("Be helpful."));
        assert_eq!(wire[1].role, "user");
    }

    #[test]
    fn test_tool_result_role_remap() {
        let log = vec![
            Message::user("read"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest {
                    id: "c1".to_string(),
                    name: "read_file".to_string(),
                    arguments: json!({"path": "memo.txt"}),
                }],
            ),
            Message::tool_result("c1", json!({"success": true, "content": "Test data"})),
        ];
        let wire = messages_for_completion(&session_with_log(log)).unwrap();

        let assistant = &wire[2];
        assert_eq!(assistant.role, "assistant");
        assert!(assistant.content.is_none(), "empty text omitted");
        let calls = assistant.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "read_file");
        // Arguments travel as a JSON string
        let args: serde_json::Value = serde_json::from_str(&calls[0].function.arguments).unwrap();
        assert_eq!(args["path"], "memo.txt");

        let result = &wire[3];
        assert_eq!(result.role, "tool");
        assert_eq!(result.tool_call_id.as_deref(), Some("c1"));
        assert!(result.content.as_ref().unwrap().contains("Test data"));
    }
}
