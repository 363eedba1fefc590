//! YAML persistence for templates and sessions
//!
//! Sessions are rewritten in full on every append, via a temp file and an
//! atomic rename, so a concurrent reader never observes a torn file. Readers
//! that hit a parse failure surface `Error::Malformed` and are expected to
//! retry after the watch debounce window.

use std::path::Path;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use super::message::Message;
use super::session::{AgentType, Session, SessionStatus, Template};
use crate::config::Layout;
use crate::error::{Error, Result};

/// File-backed store for templates and sessions
#[derive(Debug, Clone)]
pub struct ConversationStore {
    layout: Layout,
}

impl ConversationStore {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Read an agent template. Templates are immutable; the orchestrator
    /// never writes them.
    pub fn read_template(&self, agent_id: &str) -> Result<Template> {
        let path = self.layout.template_file(agent_id);
        read_yaml(&path)
    }

    pub fn read_session(&self, session_id: &str) -> Result<Session> {
        let path = self.layout.session_file(session_id);
        read_yaml(&path)
    }

    /// Serialize the full session and replace the file in a single atomic
    /// write, bumping `updated_at` to wall-clock now.
    pub fn write_session(&self, session: &mut Session) -> Result<()> {
        session.updated_at = Utc::now();
        let path = self.layout.session_file(&session.id);
        let yaml = serde_yml::to_string(session)?;
        write_atomic(&path, &yaml)
    }

    /// Append one message: read, push, write.
    pub fn append_message(&self, session_id: &str, message: Message) -> Result<()> {
        let mut session = self.read_session(session_id)?;
        session.log.push(message);
        self.write_session(&mut session)
    }

    /// Clone template metadata into a new session with an empty log.
    ///
    /// When no id is given one is derived as `<agent>-<nonce>`.
    pub fn create_session(&self, agent_id: &str, session_id: Option<&str>) -> Result<String> {
        let template = self.read_template(agent_id)?;
        let id = match session_id {
            Some(id) => id.to_string(),
            None => format!("{}-{}", agent_id, &Uuid::new_v4().simple().to_string()[..8]),
        };
        let mut session = Session::from_template(&template, id.clone());
        self.write_session(&mut session)?;
        Ok(id)
    }

    /// All parseable sessions, sorted by filename. Unparseable files are
    /// logged and skipped; they will be retried on a later pass.
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut ids = self.list_session_ids()?;
        ids.sort();
        let mut sessions = Vec::new();
        for id in ids {
            match self.read_session(&id) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!("skipping session {}: {}", id, e),
            }
        }
        Ok(sessions)
    }

    /// Session ids present on disk, derived from filenames.
    pub fn list_session_ids(&self) -> Result<Vec<String>> {
        let dir = self.layout.sessions_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(id) = name.strip_suffix(".session.yaml") {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn list_templates(&self) -> Result<Vec<Template>> {
        let dir = self.layout.templates_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(id) = name.strip_suffix(".agent.yaml") {
                names.push(id.to_string());
            }
        }
        names.sort();
        let mut templates = Vec::new();
        for id in names {
            match self.read_template(&id) {
                Ok(t) => templates.push(t),
                Err(e) => warn!("skipping template {}: {}", id, e),
            }
        }
        Ok(templates)
    }

    /// First template of the given type, by filename order.
    pub fn find_template_by_type(&self, agent_type: AgentType) -> Result<Option<Template>> {
        Ok(self
            .list_templates()?
            .into_iter()
            .find(|t| t.agent_type == agent_type))
    }

    /// Mark a session errored and persist it. Used when an invariant
    /// violation makes further advancement unsafe.
    pub fn mark_error(&self, session_id: &str, reason: &str) -> Result<()> {
        let mut session = self.read_session(session_id)?;
        session.status = SessionStatus::Error;
        session
            .metadata
            .insert("error".to_string(), serde_json::Value::String(reason.to_string()));
        self.write_session(&mut session)
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let normalized = raw.replace("\r\n", "\n");
    serde_yml::from_str(&normalized).map_err(|e| Error::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write content to a temp sibling and rename it into place.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Config(format!("no parent directory for {}", path.display())))?;
    std::fs::create_dir_all(parent)?;
    let tmp = parent.join(format!(
        ".{}.tmp",
        path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
    ));
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
