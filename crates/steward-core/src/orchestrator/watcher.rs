//! Watch mode: the event reactor
//!
//! File events from `notify` are funneled into a tokio channel and handled
//! after a quiet window, so half-written files are never acted on. A periodic
//! tick drives the check-in timer independently of file activity.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::Orchestrator;

/// What a batch of debounced file events asks the orchestrator to do
#[derive(Debug, Default, PartialEq, Eq)]
struct PathActions {
    sessions: Vec<String>,
    approvals: bool,
    allowlist: bool,
}

impl Orchestrator {
    /// Run the persistent event loop until ctrl-c.
    pub async fn run_watch(self: Arc<Self>) -> Result<()> {
        // Catch up on whatever happened while the daemon was down
        self.reconcile()?;
        self.scan_decisions().await?;
        for id in self.store().list_session_ids()? {
            self.step_session(&id).await;
        }

        let (event_tx, mut event_rx) = mpsc::channel::<Event>(256);
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = event_tx.blocking_send(event);
                }
                Err(e) => warn!("watcher error: {}", e),
            },
            notify::Config::default(),
        )
        .map_err(|e| Error::Config(format!("failed to create watcher: {}", e)))?;
        watcher
            .watch(self.layout().root(), RecursiveMode::Recursive)
            .map_err(|e| Error::Config(format!("failed to watch {}: {}", self.layout().root().display(), e)))?;

        let debounce = Duration::from_millis(self.config().watch_debounce_ms);
        let mut tick =
            tokio::time::interval(Duration::from_secs(self.config().tick_interval_secs));
        let mut pending_paths: HashSet<PathBuf> = HashSet::new();

        info!("watching {}", self.layout().root().display());
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
                _ = tick.tick() => {
                    if let Err(e) = self.evaluate_checkin().await {
                        warn!("check-in evaluation failed: {}", e);
                    }
                }
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            pending_paths.extend(event.paths);
                        }
                        None => {
                            warn!("watcher channel closed");
                            break;
                        }
                    }
                }
                // Quiet window: fires only when the other branches have been
                // silent for the full debounce duration
                _ = tokio::time::sleep(debounce), if !pending_paths.is_empty() => {
                    let paths = std::mem::take(&mut pending_paths);
                    let actions = self.classify_paths(&paths);
                    Arc::clone(&self).dispatch_actions(actions).await;
                }
            }
        }
        Ok(())
    }

    fn classify_paths(&self, paths: &HashSet<PathBuf>) -> PathActions {
        let mut actions = PathActions::default();
        let approvals_file = self.layout().approvals_file();
        let allowlist_file = self.layout().allowlist_file();
        let sessions_dir = self.layout().sessions_dir();

        for path in paths {
            if path == &approvals_file {
                actions.approvals = true;
                continue;
            }
            if path == &allowlist_file {
                actions.allowlist = true;
                continue;
            }
            if let Some(id) = session_id_from_path(&sessions_dir, path) {
                actions.sessions.push(id);
            }
        }
        actions.sessions.sort();
        actions.sessions.dedup();
        actions
    }

    async fn dispatch_actions(self: Arc<Self>, actions: PathActions) {
        if actions.allowlist {
            debug!("allowlist changed, reloading");
            self.reload_allowlist();
        }
        if actions.approvals {
            debug!("approvals ledger changed");
            if let Err(e) = self.reconcile() {
                warn!("reconciliation failed: {}", e);
            }
            if let Err(e) = self.scan_decisions().await {
                warn!("decision scan failed: {}", e);
            }
        }
        // Different sessions may advance in parallel; the processing set
        // drops reentrant attempts on the same one.
        for id in actions.sessions {
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                this.step_session(&id).await;
            });
        }
    }
}

/// Extract a session id from a changed path, ignoring temp files.
fn session_id_from_path(sessions_dir: &Path, path: &Path) -> Option<String> {
    if path.parent() != Some(sessions_dir) {
        return None;
    }
    let name = path.file_name()?.to_str()?;
    if name.starts_with('.') {
        return None;
    }
    name.strip_suffix(".session.yaml").map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_from_path() {
        let dir = Path::new("/work/sessions");
        assert_eq!(
            session_id_from_path(dir, Path::new("/work/sessions/planner-01.session.yaml")),
            Some("planner-01".to_string())
        );
        // Temp files from atomic writes are ignored
        assert_eq!(
            session_id_from_path(dir, Path::new("/work/sessions/.planner-01.session.yaml.tmp")),
            None
        );
        // Files elsewhere are not sessions
        assert_eq!(
            session_id_from_path(dir, Path::new("/work/templates/planner.agent.yaml")),
            None
        );
        assert_eq!(
            session_id_from_path(dir, Path::new("/work/sessions/notes.txt")),
            None
        );
    }
}
