//! Agent templates and session transcripts

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::{Message, Role, ToolCallRequest};
use crate::error::{Error, Result};

/// Agent archetype, copied from template into every session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Planner,
    Retriever,
    Executor,
    Evaluator,
    Solo,
}

/// Immutable agent blueprint, created externally under `templates/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub agent_type: AgentType,
    pub model: String,
    pub system_prompt: String,
    /// Names referencing the tool registry
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Sleeping,
    Completed,
    Error,
}

/// One live conversation instance of a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub agent_id: String,
    pub agent_type: AgentType,
    pub model: String,
    pub system_prompt: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub log: Vec<Message>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Session {
    /// Instantiate a fresh session from a template.
    pub fn from_template(template: &Template, session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: session_id.into(),
            agent_id: template.id.clone(),
            agent_type: template.agent_type,
            model: template.model.clone(),
            system_prompt: template.system_prompt.clone(),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
            log: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.log.last()
    }

    /// The last assistant message that declared tool calls, if any.
    pub fn last_tool_call_turn(&self) -> Option<&Message> {
        self.log
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.tool_calls.is_empty())
    }

    /// Tool calls of the latest assistant turn that have no tool_result yet,
    /// in declared order.
    pub fn open_tool_calls(&self) -> Vec<&ToolCallRequest> {
        let Some(turn) = self.last_tool_call_turn() else {
            return Vec::new();
        };
        turn.tool_calls
            .iter()
            .filter(|tc| !self.has_tool_result(&tc.id))
            .collect()
    }

    pub fn has_tool_result(&self, call_id: &str) -> bool {
        self.log
            .iter()
            .any(|m| m.role == Role::ToolResult && m.tool_call_id.as_deref() == Some(call_id))
    }

    /// Look up the tool name for a call id across the whole log.
    pub fn tool_name_for_call(&self, call_id: &str) -> Option<&str> {
        self.log.iter().rev().find_map(|m| {
            m.tool_calls
                .iter()
                .find(|tc| tc.id == call_id)
                .map(|tc| tc.name.as_str())
        })
    }

    /// A session is advancable iff it is active, the last message's role is
    /// user or tool_result, and no tool call of the latest assistant turn is
    /// still waiting for its result.
    pub fn is_advancable(&self) -> bool {
        if self.status != SessionStatus::Active {
            return false;
        }
        let Some(last) = self.last_message() else {
            return false;
        };
        if !matches!(last.role, Role::User | Role::ToolResult) {
            return false;
        }
        self.open_tool_calls().is_empty()
    }

    /// Verify every tool_result refers back to a known tool call.
    ///
    /// A dangling reference is unrecoverable for this session.
    pub fn validate_log(&self) -> Result<()> {
        let mut known_calls: Vec<&str> = Vec::new();
        for msg in &self.log {
            for tc in &msg.tool_calls {
                known_calls.push(tc.id.as_str());
            }
            if msg.role == Role::ToolResult {
                let id = msg.tool_call_id.as_deref().unwrap_or("");
                if id.is_empty() || !known_calls.contains(&id) {
                    return Err(Error::BrokenLog {
                        session: self.id.clone(),
                        reason: format!("tool_result references unknown call id {:?}", id),
                    });
                }
            }
        }
        Ok(())
    }
}
