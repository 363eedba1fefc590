//! Session advancer
//!
//! The only component that calls the completion service. One advancement
//! step is one round-trip plus any immediately resulting tool executions.

use tracing::{debug, warn};

use crate::completion::ToolChoice;
use crate::error::Result;
use crate::store::{messages_for_completion, Message, Role, Session, Template, ToolCallRequest};

use super::Orchestrator;

/// What one advancement attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// A completion round-trip happened and the log grew
    Advanced,
    /// The session did not qualify for advancement
    NotAdvancable,
    /// Planner-style agent already finished its turn with a created task
    TurnComplete,
    /// The reply was unusable and the session was marked errored
    Errored,
}

impl Orchestrator {
    /// Run one advancement step for a session already loaded from disk.
    pub(crate) async fn advance_session(&self, session: &Session) -> Result<AdvanceOutcome> {
        if !session.is_advancable() {
            return Ok(AdvanceOutcome::NotAdvancable);
        }
        let Some(last) = session.last_message() else {
            return Ok(AdvanceOutcome::NotAdvancable);
        };

        // A planner that just created a task has finished its turn; a fresh
        // user message does not reopen it.
        if last.role == Role::User && finished_turn_with_created_task(session) {
            debug!("session {}: turn already complete via create_task", session.id);
            return Ok(AdvanceOutcome::TurnComplete);
        }

        let template = match self.store().read_template(&session.agent_id) {
            Ok(template) => Some(template),
            Err(e) => {
                warn!("session {}: template unreadable: {}", session.id, e);
                None
            }
        };
        let tool_choice = resolve_tool_choice(last.role, template.as_ref());
        let registry = self.registry_for(session);

        let messages = messages_for_completion(session)?;
        let reply = self
            .completion()
            .complete(&session.model, messages, registry.schemas(), tool_choice)
            .await?;

        if !reply.tool_calls.is_empty() {
            let calls: Vec<ToolCallRequest> = reply
                .tool_calls
                .iter()
                .map(|tc| ToolCallRequest {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: tc.arguments.clone(),
                })
                .collect();
            self.store().append_message(
                &session.id,
                Message::assistant_with_tool_calls(
                    reply.content.clone().unwrap_or_default(),
                    calls,
                ),
            )?;
            self.run_tool_calls(&session.id).await?;
            return Ok(AdvanceOutcome::Advanced);
        }

        if !reply.is_empty() {
            self.store().append_message(
                &session.id,
                Message::assistant(reply.content.unwrap_or_default()),
            )?;
            return Ok(AdvanceOutcome::Advanced);
        }

        // Neither text nor tool calls: record the failure in the log and stop
        // advancing this session.
        warn!("session {}: completion returned an empty reply", session.id);
        self.store().append_message(
            &session.id,
            Message::assistant("[error] completion service returned an empty reply"),
        )?;
        self.store()
            .mark_error(&session.id, "empty completion reply")?;
        Ok(AdvanceOutcome::Errored)
    }
}

/// True when the most recent completed tool of the session was a successful
/// `create_task`: the planner-style agent's turn is over.
fn finished_turn_with_created_task(session: &Session) -> bool {
    let Some(result_msg) = session
        .log
        .iter()
        .rev()
        .find(|m| m.role == Role::ToolResult)
    else {
        return false;
    };
    let Some(call_id) = result_msg.tool_call_id.as_deref() else {
        return false;
    };
    if session.tool_name_for_call(call_id) != Some("create_task") {
        return false;
    }
    result_msg
        .result
        .as_ref()
        .and_then(|r| r.get("success"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// The tool_choice heuristic: after a tool_result the model decides freely;
/// on a user message a template may force a tool call via
/// `metadata.tool_choice: required`.
fn resolve_tool_choice(last_role: Role, template: Option<&Template>) -> ToolChoice {
    if last_role == Role::ToolResult {
        return ToolChoice::Auto;
    }
    let forced = template
        .and_then(|t| t.metadata.get("tool_choice"))
        .and_then(|v| v.as_str());
    match forced {
        Some("required") => ToolChoice::Required,
        _ => ToolChoice::Auto,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AgentType;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn template(metadata: BTreeMap<String, serde_json::Value>) -> Template {
        Template {
            id: "planner".to_string(),
            agent_type: AgentType::Planner,
            model: "gpt-4o".to_string(),
            system_prompt: "plan".to_string(),
            tools: vec!["create_task".to_string()],
            metadata,
        }
    }

    fn session_with(log: Vec<Message>) -> Session {
        let mut session = Session::from_template(&template(BTreeMap::new()), "planner-1");
        session.log = log;
        session
    }

    fn call(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: json!({}),
        }
    }

    #[test]
    fn test_turn_complete_after_successful_create_task() {
        let session = session_with(vec![
            Message::user("assign work"),
            Message::assistant_with_tool_calls("", vec![call("c1", "create_task")]),
            Message::tool_result("c1", json!({"success": true})),
            Message::user("new ping"),
        ]);
        assert!(finished_turn_with_created_task(&session));
    }

    #[test]
    fn test_failed_create_task_does_not_finish_turn() {
        let session = session_with(vec![
            Message::user("assign work"),
            Message::assistant_with_tool_calls("", vec![call("c1", "create_task")]),
            Message::tool_result("c1", json!({"success": false, "error": "nope"})),
            Message::user("new ping"),
        ]);
        assert!(!finished_turn_with_created_task(&session));
    }

    #[test]
    fn test_other_tool_does_not_finish_turn() {
        let session = session_with(vec![
            Message::user("read"),
            Message::assistant_with_tool_calls("", vec![call("c1", "read_file")]),
            Message::tool_result("c1", json!({"success": true})),
            Message::user("again"),
        ]);
        assert!(!finished_turn_with_created_task(&session));
    }

    #[test]
    fn test_tool_choice_auto_after_tool_result() {
        let mut metadata = BTreeMap::new();
        metadata.insert("tool_choice".to_string(), json!("required"));
        let t = template(metadata);
        assert_eq!(
            resolve_tool_choice(Role::ToolResult, Some(&t)),
            ToolChoice::Auto
        );
        assert_eq!(
            resolve_tool_choice(Role::User, Some(&t)),
            ToolChoice::Required
        );
        assert_eq!(resolve_tool_choice(Role::User, None), ToolChoice::Auto);
    }
}
