//! Steward Core - file-backed multi-agent orchestration
//!
//! This crate provides the core functionality for the Steward daemon:
//! - Agent templates and session transcripts persisted as YAML files
//! - A human-editable markdown approval ledger for gated operations
//! - Tool system for file, shell, task-store, and messaging operations
//! - The session advancer and the watch/pump orchestrator loop

pub mod completion;
pub mod config;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod store;
pub mod tools;

pub use completion::{
    AssistantReply, CompletionClient, HttpCompletion, MockCompletion, ParsedToolCall, ToolChoice,
    ToolSchema, WireMessage,
};
pub use config::{defaults, Layout, OrchestratorConfig};
pub use error::{Error, Result, ToolError};
pub use ledger::{ApprovalEntry, ApprovalLedger, ApprovalStatus, RiskLevel};
pub use orchestrator::{AdvanceOutcome, CheckinState, Orchestrator};
pub use store::{
    AgentType, ConversationStore, Message, Role, Session, SessionStatus, Template, ToolCallRequest,
};
pub use tools::{ShellAllowlist, Tool, ToolOutput, ToolRegistry, ToolRegistryBuilder};
