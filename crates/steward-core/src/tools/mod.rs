//! Tool system for steward agents
//!
//! Tools are the actions the models can take. Each tool has:
//! - A name and description for the LLM
//! - A JSON schema for parameters
//! - An execute method
//! - An approval predicate over its arguments

pub mod filesystem;
pub mod introspect;
pub mod messaging;
pub mod shell;
pub mod tasks;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::completion::ToolSchema;
use crate::config::{defaults, Layout};
use crate::error::ToolError;

pub use shell::ShellAllowlist;

/// Output from a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Whether the tool succeeded
    pub success: bool,
    /// The output content (text, JSON object, etc.)
    pub content: Value,
    /// Optional error message
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn success(content: impl Into<Value>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: Value::Null,
            error: Some(message.into()),
        }
    }

    /// Flatten into the structured record stored on a tool_result message:
    /// `{success, ...content fields, error?}`.
    pub fn to_value(&self) -> Value {
        let mut map = match &self.content {
            Value::Object(m) => m.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                let mut m = serde_json::Map::new();
                m.insert("content".to_string(), other.clone());
                m
            }
        };
        map.insert("success".to_string(), Value::Bool(self.success));
        if let Some(err) = &self.error {
            map.insert("error".to_string(), Value::String(err.clone()));
        }
        Value::Object(map)
    }
}

/// Core trait for all tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used by the LLM to invoke)
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with given parameters
    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError>;

    /// Whether this invocation must pass the human approval gate
    fn requires_approval(&self, _params: &Value) -> bool {
        false
    }

    /// Convert to the schema sent to the completion service
    fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Registry of available tools
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Schemas for the completion request, sorted by name for a stable wire
    /// order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.to_schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Builds the canonical tool set for a workspace, optionally restricted to a
/// template's declared tool list.
pub struct ToolRegistryBuilder {
    layout: Layout,
    allowlist: Arc<ShellAllowlist>,
    todo_bin: String,
    default_channel: String,
}

impl ToolRegistryBuilder {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            allowlist: Arc::new(ShellAllowlist::empty()),
            todo_bin: defaults::TODO_BIN.to_string(),
            default_channel: defaults::DEFAULT_CHANNEL.to_string(),
        }
    }

    pub fn with_allowlist(mut self, allowlist: Arc<ShellAllowlist>) -> Self {
        self.allowlist = allowlist;
        self
    }

    pub fn with_todo_bin(mut self, bin: impl Into<String>) -> Self {
        self.todo_bin = bin.into();
        self
    }

    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel = channel.into();
        self
    }

    /// Register every canonical tool.
    pub fn build(self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        let layout = &self.layout;

        registry.register(Arc::new(filesystem::ReadFile::new(layout.root())));
        registry.register(Arc::new(filesystem::WriteFile::new(layout.root())));
        registry.register(Arc::new(filesystem::ListDirectory::new(layout.root())));
        registry.register(Arc::new(filesystem::CreateDirectory::new(layout.root())));

        registry.register(Arc::new(shell::ExecuteCommand::new(
            layout.root(),
            self.allowlist.clone(),
        )));

        registry.register(Arc::new(tasks::QueryTasks::new(&self.todo_bin)));
        registry.register(Arc::new(tasks::CreateTask::new(&self.todo_bin)));
        registry.register(Arc::new(tasks::UpdateTask::new(&self.todo_bin)));

        registry.register(Arc::new(messaging::SendMessage::new()));
        registry.register(Arc::new(messaging::SlackSend::new(layout.clone())));
        registry.register(Arc::new(messaging::SlackRead::new(
            layout.clone(),
            &self.default_channel,
        )));

        registry.register(Arc::new(introspect::ListActiveSessions::new(layout.clone())));
        registry.register(Arc::new(introspect::ReadSessionFile::new(layout.clone())));
        registry.register(Arc::new(introspect::EditSession::new(layout.clone())));

        registry
    }

    /// Register only the tools a template declares. Unknown names are
    /// ignored; the template author sees the effect in the wire schemas.
    pub fn build_for(self, declared: &[String]) -> ToolRegistry {
        let full = self.build();
        let mut registry = ToolRegistry::new();
        for name in declared {
            if let Some(tool) = full.get(name) {
                registry.register(tool);
            } else {
                tracing::warn!("template declares unknown tool {:?}", name);
            }
        }
        registry
    }
}
