//! Planner check-in timer
//!
//! Planner agents have no event source once initial tasks are assigned; a
//! timed user-role nudge is what makes the system converge without human
//! prodding. The first evaluation only records a baseline.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::defaults;
use crate::error::{Error, Result};
use crate::store::{AgentType, Message};

use super::Orchestrator;

/// Persisted timer state at `storage/planner-checkin.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checkin: Option<DateTime<Utc>>,
    pub interval_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planner_session: Option<String>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub last_reason: String,
}

impl CheckinState {
    pub fn load(path: &Path, default_interval_secs: u64) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    last_checkin: None,
                    interval_secs: default_interval_secs,
                    planner_session: None,
                    count: 0,
                    last_reason: String::new(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        serde_yml::from_str(&raw).map_err(|e| Error::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yml::to_string(self)?;
        let tmp = path.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Orchestrator {
    /// Evaluate the check-in timer once.
    ///
    /// First evaluation ever writes the baseline timestamp and does not
    /// trigger; later ones append the check-in prompt to the planner session
    /// when the interval has elapsed.
    pub async fn evaluate_checkin(&self) -> Result<()> {
        let path = self.layout().checkin_file();
        let mut state = CheckinState::load(&path, self.config().checkin_interval_secs)?;
        let now = Utc::now();

        let Some(last) = state.last_checkin else {
            state.last_checkin = Some(now);
            state.last_reason = "baseline recorded".to_string();
            state.save(&path)?;
            debug!("check-in baseline recorded");
            return Ok(());
        };

        let elapsed = (now - last).num_seconds();
        if elapsed < state.interval_secs as i64 {
            return Ok(());
        }

        let Some(template) = self.store().find_template_by_type(AgentType::Planner)? else {
            debug!("check-in due but no planner template exists");
            return Ok(());
        };

        let session_id = match self.find_planner_session(&template.id)? {
            Some(id) => id,
            None => {
                let id = self.store().create_session(&template.id, None)?;
                info!("created planner session {} for check-in", id);
                id
            }
        };

        self.store()
            .append_message(&session_id, Message::user(defaults::CHECKIN_PROMPT))?;

        state.last_checkin = Some(now);
        state.count += 1;
        state.planner_session = Some(session_id.clone());
        state.last_reason = format!(
            "interval elapsed ({}s >= {}s)",
            elapsed, state.interval_secs
        );
        state.save(&path)?;
        info!(
            "check-in #{} appended to planner session {}",
            state.count, session_id
        );
        Ok(())
    }

    /// Earliest session (by filename) instantiated from the planner template.
    fn find_planner_session(&self, planner_id: &str) -> Result<Option<String>> {
        let prefix = format!("{}-", planner_id);
        Ok(self
            .store()
            .list_session_ids()?
            .into_iter()
            .find(|id| id.starts_with(&prefix)))
    }
}
