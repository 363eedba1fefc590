//! Conversation store
//!
//! Marshals agent templates and session transcripts between their persisted
//! YAML form and the in-memory model, and exposes atomic, append-only message
//! writes. The orchestrator is the single writer for session files; humans may
//! edit them between steps.

mod message;
mod persistence;
mod session;
mod wire;

pub use message::{Message, Role, ToolCallRequest};
pub use persistence::ConversationStore;
pub use session::{AgentType, Session, SessionStatus, Template};
pub use wire::messages_for_completion;
