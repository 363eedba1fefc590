//! The orchestrator loop
//!
//! One process owns the file tree. In watch mode it reacts to file events and
//! a periodic tick; in pump mode it runs exactly one reconciliation pass and
//! returns, which is what the deterministic tests drive.
//!
//! Concurrency discipline: a session is advanced by at most one task at a
//! time (reentrancy attempts are dropped via the processing set); different
//! sessions may advance in parallel; the check-in tick only ever appends to
//! the planner session.

mod advancer;
mod checkin;
mod dispatch;
mod watcher;

pub use advancer::AdvanceOutcome;
pub use checkin::CheckinState;
pub use dispatch::PendingAction;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::completion::CompletionClient;
use crate::config::{Layout, OrchestratorConfig};
use crate::error::{Error, Result};
use crate::ledger::{ApprovalLedger, ApprovalStatus};
use crate::store::{ConversationStore, Session};
use crate::tools::{ShellAllowlist, ToolRegistry, ToolRegistryBuilder};

/// The long-running orchestrator
pub struct Orchestrator {
    store: ConversationStore,
    ledger: ApprovalLedger,
    layout: Layout,
    config: OrchestratorConfig,
    completion: Arc<dyn CompletionClient>,
    allowlist: RwLock<Arc<ShellAllowlist>>,
    /// Sessions currently being advanced
    processing: Mutex<HashSet<String>>,
    /// Gated tool calls waiting on a human decision, keyed by approval id
    pending_actions: Mutex<HashMap<String, PendingAction>>,
}

impl Orchestrator {
    pub fn new(layout: Layout, completion: Arc<dyn CompletionClient>) -> Result<Self> {
        let config = OrchestratorConfig::load(&layout)?;
        Self::with_config(layout, config, completion)
    }

    pub fn with_config(
        layout: Layout,
        config: OrchestratorConfig,
        completion: Arc<dyn CompletionClient>,
    ) -> Result<Self> {
        layout.ensure()?;
        let allowlist = Arc::new(ShellAllowlist::load(&layout.allowlist_file())?);
        let store = ConversationStore::new(layout.clone());
        let ledger = ApprovalLedger::new(layout.approvals_file());
        Ok(Self {
            store,
            ledger,
            layout,
            config,
            completion,
            allowlist: RwLock::new(allowlist),
            processing: Mutex::new(HashSet::new()),
            pending_actions: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn ledger(&self) -> &ApprovalLedger {
        &self.ledger
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn pending_action_count(&self) -> usize {
        self.pending_actions.lock().len()
    }

    /// Run exactly one reconciliation pass: check-in evaluation, rebuild of
    /// the pending-action map from disk, decision scan, then one advancement
    /// attempt per session.
    pub async fn pump(&self) -> Result<()> {
        if let Err(e) = self.evaluate_checkin().await {
            warn!("check-in evaluation failed: {}", e);
        }
        if let Err(e) = self.reconcile() {
            warn!("reconciliation failed: {}", e);
        }
        if let Err(e) = self.scan_decisions().await {
            warn!("decision scan failed: {}", e);
        }
        for id in self.store.list_session_ids()? {
            self.step_session(&id).await;
        }
        Ok(())
    }

    /// Rebuild `pending_actions` from the ledger and the session logs.
    ///
    /// Entries whose call already has a tool_result are archived as resolved;
    /// entries whose call no longer appears in the latest assistant turn are
    /// archived as stale.
    pub fn reconcile(&self) -> Result<()> {
        for entry in self.ledger.entries()? {
            if !entry.is_open() {
                continue;
            }
            let session = match self.store.read_session(&entry.session_id) {
                Ok(session) => session,
                Err(Error::NotFound(_)) => {
                    warn!("approval {} references missing session {}", entry.id, entry.session_id);
                    self.ledger.close(&entry.id, "stale")?;
                    continue;
                }
                Err(e) => {
                    debug!("skipping approval {} this pass: {}", entry.id, e);
                    continue;
                }
            };

            if session.has_tool_result(&entry.call_id) {
                self.ledger.close(&entry.id, "resolved")?;
                self.pending_actions.lock().remove(&entry.id);
                continue;
            }

            let matching = session
                .open_tool_calls()
                .into_iter()
                .find(|tc| tc.id == entry.call_id)
                .cloned();
            match matching {
                Some(call) => {
                    self.pending_actions.lock().insert(
                        entry.id.clone(),
                        PendingAction {
                            session_id: entry.session_id.clone(),
                            call,
                        },
                    );
                }
                None => {
                    self.ledger.close(&entry.id, "stale")?;
                }
            }
        }
        Ok(())
    }

    /// Apply human decisions in ledger (insertion) order.
    pub async fn scan_decisions(&self) -> Result<()> {
        for entry in self.ledger.entries()? {
            if !entry.is_open() || entry.status == ApprovalStatus::Pending {
                continue;
            }
            let action = self.pending_actions.lock().get(&entry.id).cloned();
            let Some(action) = action else {
                continue;
            };
            if let Err(e) = self.apply_decision(&entry, &action).await {
                warn!("applying decision for approval {} failed: {}", entry.id, e);
            }
            self.pending_actions.lock().remove(&entry.id);
        }
        Ok(())
    }

    /// Advance one session if it needs work: finish an interrupted tool turn
    /// first, otherwise run one advancement step. Per-session failures are
    /// logged, never propagated.
    pub async fn step_session(&self, session_id: &str) {
        let _guard = match self.begin_processing(session_id) {
            Some(guard) => guard,
            None => {
                debug!("session {} already processing, dropping", session_id);
                return;
            }
        };

        let session = match self.store.read_session(session_id) {
            Ok(session) => session,
            Err(Error::NotFound(_)) => return,
            Err(e) => {
                // Possibly observed mid-write; the next event or pass retries
                debug!("session {} unreadable this pass: {}", session_id, e);
                return;
            }
        };

        if let Err(e) = session.validate_log() {
            warn!("session {}: {}", session_id, e);
            if let Err(e) = self.store.mark_error(session_id, &e.to_string()) {
                warn!("failed to mark session {} errored: {}", session_id, e);
            }
            return;
        }

        if !session.open_tool_calls().is_empty() {
            // An assistant turn is mid-flight (typically waiting on a gate)
            if let Err(e) = self.run_tool_calls(session_id).await {
                warn!("session {}: resuming tool calls failed: {}", session_id, e);
            }
            return;
        }

        match self.advance_session(&session).await {
            Ok(outcome) => debug!("session {}: {:?}", session_id, outcome),
            Err(e) => warn!("session {}: advancement failed, will retry: {}", session_id, e),
        }
    }

    /// Build the tool registry a session is allowed to use, from its
    /// template's declared tool list.
    pub(crate) fn registry_for(&self, session: &Session) -> ToolRegistry {
        let declared = match self.store.read_template(&session.agent_id) {
            Ok(template) => template.tools,
            Err(e) => {
                warn!(
                    "template {} unreadable ({}); session {} gets no tools",
                    session.agent_id, e, session.id
                );
                Vec::new()
            }
        };
        ToolRegistryBuilder::new(self.layout.clone())
            .with_allowlist(self.allowlist.read().clone())
            .with_todo_bin(&self.config.todo_bin)
            .with_default_channel(&self.config.default_channel)
            .build_for(&declared)
    }

    pub(crate) fn reload_allowlist(&self) {
        match ShellAllowlist::load(&self.layout.allowlist_file()) {
            Ok(allowlist) => *self.allowlist.write() = Arc::new(allowlist),
            Err(e) => warn!("allowlist reload failed, keeping previous: {}", e),
        }
    }

    pub(crate) fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub(crate) fn completion(&self) -> &Arc<dyn CompletionClient> {
        &self.completion
    }

    pub(crate) fn pending_actions(&self) -> &Mutex<HashMap<String, PendingAction>> {
        &self.pending_actions
    }

    fn begin_processing(&self, session_id: &str) -> Option<ProcessingGuard<'_>> {
        let mut processing = self.processing.lock();
        if !processing.insert(session_id.to_string()) {
            return None;
        }
        Some(ProcessingGuard {
            set: &self.processing,
            id: session_id.to_string(),
        })
    }
}

struct ProcessingGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}
