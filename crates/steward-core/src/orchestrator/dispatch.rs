//! Tool dispatcher and approval gate
//!
//! Safe calls execute immediately; gated calls become ledger entries and the
//! turn suspends until the human decides. Execution is strictly in declared
//! order: nothing after a gated call runs before its decision. The position
//! in the turn is always re-derived from the log (first call without a
//! result), so a restart resumes exactly where it stopped.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::completion::parse_arguments;
use crate::error::{Error, Result};
use crate::ledger::{classify, ApprovalEntry, ApprovalStatus};
use crate::store::{Message, Session, SessionStatus, ToolCallRequest};
use crate::tools::{messaging::ROUTE_MESSAGE_INTENT, Tool};

use super::Orchestrator;

/// A gated tool call waiting on a human decision
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub session_id: String,
    pub call: ToolCallRequest,
}

impl Orchestrator {
    /// Work through the open tool calls of a session's latest assistant turn,
    /// in declared order, suspending at the first gated call.
    pub(crate) async fn run_tool_calls(&self, session_id: &str) -> Result<()> {
        loop {
            let session = self.store().read_session(session_id)?;
            if session.status != SessionStatus::Active {
                return Ok(());
            }
            let Some(call) = session.open_tool_calls().first().map(|c| (*c).clone()) else {
                return Ok(());
            };
            let registry = self.registry_for(&session);

            let args = match parse_arguments(&call.arguments) {
                Ok(args) => args,
                Err(e) => {
                    // Malformed arguments are the model's problem to react to
                    self.append_result(
                        session_id,
                        &call.id,
                        json!({"success": false, "error": e.to_string()}),
                    )?;
                    continue;
                }
            };

            let Some(tool) = registry.get(&call.name) else {
                self.append_result(
                    session_id,
                    &call.id,
                    json!({"success": false, "error": format!("unknown tool: {}", call.name)}),
                )?;
                continue;
            };

            if tool.requires_approval(&args) {
                self.enqueue_approval(&session, &call, &args)?;
                return Ok(());
            }

            if call.name == "send_message" {
                self.route_message(&session, &call, tool, args).await?;
                continue;
            }

            let result = match execute_tool(tool, args, false).await {
                Ok(result) => result,
                Err(e @ Error::GateViolation(_)) => {
                    warn!("session {}: {}", session_id, e);
                    self.store().mark_error(session_id, &e.to_string())?;
                    return Err(e);
                }
                Err(e) => return Err(e),
            };
            self.append_result(session_id, &call.id, result)?;
        }
    }

    /// Record a gated call in the ledger and the in-memory map. Idempotent
    /// across passes and restarts: an open entry for the same call id is
    /// never duplicated.
    fn enqueue_approval(
        &self,
        session: &Session,
        call: &ToolCallRequest,
        args: &Value,
    ) -> Result<()> {
        let entry = match self.ledger().find_for_call(&call.id)? {
            Some(existing) => existing,
            None => {
                let risk = classify(&call.name, args);
                let description = describe_call(&call.name, args);
                let id = self.ledger().request(
                    &session.id,
                    &call.name,
                    &call.id,
                    args,
                    risk,
                    &description,
                )?;
                info!(
                    "session {}: {} gated as approval {} ({})",
                    session.id, call.name, id, risk
                );
                self.ledger()
                    .entry(&id)?
                    .ok_or_else(|| Error::Ledger(format!("entry {} vanished after request", id)))?
            }
        };
        self.pending_actions().lock().entry(entry.id).or_insert(PendingAction {
            session_id: session.id.clone(),
            call: call.clone(),
        });
        Ok(())
    }

    /// Act on a human decision for a pending action: execute or reject, then
    /// archive the entry and continue the suspended turn.
    pub(crate) async fn apply_decision(
        &self,
        entry: &ApprovalEntry,
        action: &PendingAction,
    ) -> Result<()> {
        let session = self.store().read_session(&action.session_id)?;
        if session.has_tool_result(&action.call.id) {
            // Already resolved; never execute twice
            self.ledger().close(&entry.id, "resolved")?;
            return Ok(());
        }

        let result = match entry.status {
            ApprovalStatus::Approved => {
                let registry = self.registry_for(&session);
                let args = parse_arguments(&action.call.arguments)?;
                match registry.get(&action.call.name) {
                    Some(tool) => {
                        info!(
                            "session {}: executing approved {} (approval {})",
                            session.id, action.call.name, entry.id
                        );
                        execute_tool(tool, args, true).await?
                    }
                    None => json!({
                        "success": false,
                        "error": format!("unknown tool: {}", action.call.name),
                    }),
                }
            }
            ApprovalStatus::Rejected => {
                info!(
                    "session {}: {} rejected by operator (approval {})",
                    session.id, action.call.name, entry.id
                );
                let mut result = json!({
                    "success": false,
                    "error": "rejected by operator",
                });
                if !entry.notes.is_empty() {
                    result["notes"] = json!(entry.notes.join("\n"));
                }
                result
            }
            ApprovalStatus::Pending => {
                return Err(Error::Ledger(format!(
                    "approval {} is still pending",
                    entry.id
                )));
            }
        };

        self.append_result(&action.session_id, &action.call.id, result)?;
        self.ledger().close(&entry.id, entry.status.as_str())?;
        // The turn may have further calls after the gate
        self.run_tool_calls(&action.session_id).await
    }

    /// The one privileged routing tool: the executor only emits an intent,
    /// the orchestrator performs the cross-session append. The target's log
    /// grows before the originating tool_result is written.
    async fn route_message(
        &self,
        session: &Session,
        call: &ToolCallRequest,
        tool: Arc<dyn Tool>,
        args: Value,
    ) -> Result<()> {
        let output = match tool.execute(args).await {
            Ok(output) => output,
            Err(e) => {
                self.append_result(
                    &session.id,
                    &call.id,
                    json!({"success": false, "error": e.to_string()}),
                )?;
                return Ok(());
            }
        };
        if !output.success || output.content["intent"] != ROUTE_MESSAGE_INTENT {
            self.append_result(&session.id, &call.id, output.to_value())?;
            return Ok(());
        }

        let target = output.content["target"].as_str().unwrap_or_default().to_string();
        let content = output.content["content"].as_str().unwrap_or_default().to_string();

        let result = match self.resolve_target_session(&target)? {
            Some(target_id) => {
                self.store()
                    .append_message(&target_id, Message::user(content))?;
                info!("session {}: routed message to {}", session.id, target_id);
                json!({"success": true, "delivered_to": target_id})
            }
            None => json!({
                "success": false,
                "error": format!("target session not found: {}", target),
            }),
        };
        self.append_result(&session.id, &call.id, result)
    }

    /// Exact session id first, else the earliest active session of that
    /// agent.
    fn resolve_target_session(&self, target: &str) -> Result<Option<String>> {
        let ids = self.store().list_session_ids()?;
        if ids.iter().any(|id| id == target) {
            return Ok(Some(target.to_string()));
        }
        let prefix = format!("{}-", target);
        for id in ids {
            if !id.starts_with(&prefix) {
                continue;
            }
            match self.store().read_session(&id) {
                Ok(session) if session.status == SessionStatus::Active => return Ok(Some(id)),
                Ok(_) => {}
                Err(e) => warn!("skipping candidate target {}: {}", id, e),
            }
        }
        Ok(None)
    }

    fn append_result(&self, session_id: &str, call_id: &str, result: Value) -> Result<()> {
        self.store()
            .append_message(session_id, Message::tool_result(call_id, result))
    }
}

/// Execute a tool at the last moment before it touches the world.
///
/// `approved` records whether a ledger decision authorized this call; a gated
/// tool reaching this point without one is a dispatcher bug and is refused.
/// Ordinary execution failures never propagate: the model sees
/// `{success:false, error}`.
async fn execute_tool(tool: Arc<dyn Tool>, args: Value, approved: bool) -> Result<Value> {
    if !approved {
        assert_not_gated(tool.as_ref(), &args)?;
    }
    Ok(match tool.execute(args).await {
        Ok(output) => output.to_value(),
        Err(e) => json!({"success": false, "error": e.to_string()}),
    })
}

/// Render the proposed action for the human reading the ledger.
fn describe_call(tool_name: &str, args: &Value) -> String {
    match tool_name {
        "execute_command" => {
            let command = args.get("command").and_then(|v| v.as_str()).unwrap_or("?");
            format!("Run `{}`", command)
        }
        "write_file" => {
            let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("?");
            let bytes = args
                .get("content")
                .and_then(|v| v.as_str())
                .map(|s| s.len())
                .unwrap_or(0);
            format!("Write {} bytes to {}", bytes, path)
        }
        "slack_send" => {
            let channel = args.get("channel").and_then(|v| v.as_str()).unwrap_or("?");
            format!("Send a message to #{}", channel)
        }
        "edit_session" => {
            let file = args
                .get("session_file")
                .and_then(|v| v.as_str())
                .unwrap_or("?");
            format!("Rewrite session transcript {}", file)
        }
        other => format!("{} {}", other, compact(args)),
    }
}

fn compact(args: &Value) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| "{}".to_string())
}

/// Executing a gated call without an approval record is a programming error,
/// not an operator mistake.
fn assert_not_gated(tool: &dyn Tool, args: &Value) -> Result<()> {
    if tool.requires_approval(args) {
        return Err(Error::GateViolation(format!(
            "tool {} requires approval but none was recorded",
            tool.name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_call_shapes() {
        assert_eq!(
            describe_call("execute_command", &json!({"command": "docker ps"})),
            "Run `docker ps`"
        );
        assert_eq!(
            describe_call("write_file", &json!({"path": "a.txt", "content": "hello"})),
            "Write 5 bytes to a.txt"
        );
        assert_eq!(
            describe_call("slack_send", &json!({"channel": "ops", "message": "x"})),
            "Send a message to #ops"
        );
        assert!(describe_call("edit_session", &json!({"session_file": "x"})).contains("x"));
        assert!(describe_call("future_tool", &json!({"a": 1})).starts_with("future_tool"));
    }

    #[tokio::test]
    async fn test_assert_not_gated() {
        let dir = tempfile::tempdir().unwrap();
        let write = crate::tools::filesystem::WriteFile::new(dir.path());
        let read = crate::tools::filesystem::ReadFile::new(dir.path());
        assert!(matches!(
            assert_not_gated(&write, &json!({})),
            Err(Error::GateViolation(_))
        ));
        assert!(assert_not_gated(&read, &json!({})).is_ok());
    }
}
