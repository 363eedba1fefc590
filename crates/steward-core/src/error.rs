//! Error types for Steward Core

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the Steward Error
pub type Result<T> = std::result::Result<T, Error>;

/// Steward error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("broken log in session {session}: {reason}")]
    BrokenLog { session: String, reason: String },

    #[error("gate violation: {0}")]
    GateViolation(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("completion error: {0}")]
    Completion(String),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tool-specific errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
