//! Configuration and on-disk layout for the orchestrator
//!
//! The whole system state lives in one directory tree rooted at a
//! workspace path. `Layout` knows where every file lives; `OrchestratorConfig`
//! holds the tunables loaded from an optional `config.toml` at the root.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default constants used throughout the orchestrator
pub mod defaults {
    /// Planner check-in interval in seconds
    pub const CHECKIN_INTERVAL_SECS: u64 = 60;

    /// Quiet window before reacting to a file change, in milliseconds
    pub const WATCH_DEBOUNCE_MS: u64 = 500;

    /// Periodic tick for check-in evaluation in watch mode, in seconds
    pub const TICK_INTERVAL_SECS: u64 = 5;

    /// Command execution timeout in seconds
    pub const COMMAND_TIMEOUT_SECS: u64 = 120;

    /// External task-store CLI binary
    pub const TODO_BIN: &str = "todo";

    /// Default channel for slack_read when none is given
    pub const DEFAULT_CHANNEL: &str = "general";

    /// Check-in prompt injected into the planner session
    pub const CHECKIN_PROMPT: &str = "Check-in with running agents to ensure progress";
}

/// Directory layout of a steward workspace
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.root.join("storage")
    }

    pub fn inbox_dir(&self) -> PathBuf {
        self.root.join("inbox")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.root.join("memory")
    }

    pub fn template_file(&self, agent_id: &str) -> PathBuf {
        self.templates_dir().join(format!("{}.agent.yaml", agent_id))
    }

    pub fn session_file(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{}.session.yaml", session_id))
    }

    pub fn approvals_file(&self) -> PathBuf {
        self.tasks_dir().join("approvals.task.md")
    }

    pub fn checkin_file(&self) -> PathBuf {
        self.storage_dir().join("planner-checkin.yaml")
    }

    pub fn allowlist_file(&self) -> PathBuf {
        self.storage_dir().join("terminal-cmd-allowlist.yaml")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn inbox_file(&self, channel: &str) -> PathBuf {
        self.inbox_dir().join(format!("{}.jsonl", channel))
    }

    pub fn outbox_file(&self, channel: &str) -> PathBuf {
        self.inbox_dir().join(format!("{}-outbox.jsonl", channel))
    }

    /// Create every directory the orchestrator relies on.
    ///
    /// Failure here is fatal for startup.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            self.templates_dir(),
            self.sessions_dir(),
            self.tasks_dir(),
            self.storage_dir(),
            self.inbox_dir(),
            self.memory_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
            if !dir.is_dir() {
                return Err(Error::Config(format!(
                    "required directory is not a directory: {}",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

/// Orchestrator tunables, loaded from `config.toml` at the workspace root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Planner check-in interval in seconds
    #[serde(default = "default_checkin_interval")]
    pub checkin_interval_secs: u64,

    /// File-watch quiet window in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub watch_debounce_ms: u64,

    /// Check-in evaluation tick in watch mode, in seconds
    #[serde(default = "default_tick_secs")]
    pub tick_interval_secs: u64,

    /// External task-store CLI binary name
    #[serde(default = "default_todo_bin")]
    pub todo_bin: String,

    /// Default channel for slack_read
    #[serde(default = "default_channel")]
    pub default_channel: String,
}

fn default_checkin_interval() -> u64 {
    defaults::CHECKIN_INTERVAL_SECS
}

fn default_debounce_ms() -> u64 {
    defaults::WATCH_DEBOUNCE_MS
}

fn default_tick_secs() -> u64 {
    defaults::TICK_INTERVAL_SECS
}

fn default_todo_bin() -> String {
    defaults::TODO_BIN.to_string()
}

fn default_channel() -> String {
    defaults::DEFAULT_CHANNEL.to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            checkin_interval_secs: defaults::CHECKIN_INTERVAL_SECS,
            watch_debounce_ms: defaults::WATCH_DEBOUNCE_MS,
            tick_interval_secs: defaults::TICK_INTERVAL_SECS,
            todo_bin: defaults::TODO_BIN.to_string(),
            default_channel: defaults::DEFAULT_CHANNEL.to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Load the config file if present, otherwise use defaults.
    pub fn load(layout: &Layout) -> Result<Self> {
        let path = layout.config_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}
