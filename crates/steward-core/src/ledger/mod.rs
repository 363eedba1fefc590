//! Human approval ledger
//!
//! Gated tool calls become entries in a single markdown task list that a
//! human edits by flipping the status marker: `[ ]` pending, `[x]` approved,
//! `[-]` rejected. The orchestrator only appends new entries and archival
//! lines; it never pre-marks a decision. Machine fields live on the header
//! line and in tagged continuation lines, so trailing human notes survive.

mod risk;

pub use risk::{classify, classify_command, RiskLevel};

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Decision state of an entry, read from the status marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    fn marker(&self) -> char {
        match self {
            ApprovalStatus::Pending => ' ',
            ApprovalStatus::Approved => 'x',
            ApprovalStatus::Rejected => '-',
        }
    }

    fn from_marker(c: char) -> Option<Self> {
        match c {
            ' ' => Some(ApprovalStatus::Pending),
            'x' | 'X' => Some(ApprovalStatus::Approved),
            '-' => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

/// One parsed ledger entry
#[derive(Debug, Clone)]
pub struct ApprovalEntry {
    pub id: String,
    pub tool: String,
    pub session_id: String,
    pub risk: RiskLevel,
    pub created_at: DateTime<Utc>,
    pub status: ApprovalStatus,
    /// Tool call id in the originating session. The explicit matching key for
    /// reconciliation.
    pub call_id: String,
    pub args: Value,
    pub description: String,
    /// Human-added lines below the machine fields
    pub notes: Vec<String>,
    /// Archival label once the orchestrator has acted on the decision
    pub closed: Option<String>,
}

impl ApprovalEntry {
    /// An entry is actionable while pending and not yet archived.
    pub fn is_open(&self) -> bool {
        self.closed.is_none()
    }
}

/// File-backed ledger at `tasks/approvals.task.md`
#[derive(Debug, Clone)]
pub struct ApprovalLedger {
    path: PathBuf,
}

impl ApprovalLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append a pending entry and return its approval id.
    pub fn request(
        &self,
        session_id: &str,
        tool_name: &str,
        call_id: &str,
        args: &Value,
        risk: RiskLevel,
        description: &str,
    ) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let created_at = Utc::now();

        let mut block = String::new();
        block.push_str(&format!(
            "- [ ] {} | {} | {} | {} | {}\n",
            id,
            tool_name,
            session_id,
            risk,
            created_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ));
        block.push_str(&format!("  call: {}\n", call_id));
        block.push_str(&format!("  args: {}\n", serde_json::to_string(args)?));
        for line in description.lines() {
            block.push_str(&format!("  {}\n", line));
        }

        let mut content = match std::fs::read_to_string(&self.path) {
            Ok(existing) => existing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                "# Approvals\n".to_string()
            }
            Err(e) => return Err(e.into()),
        };
        if !content.ends_with('\n') {
            content.push('\n');
        }
        content.push('\n');
        content.push_str(&block);
        std::fs::write(&self.path, content)?;
        Ok(id)
    }

    /// All entries in file order (which is insertion order).
    pub fn entries(&self) -> Result<Vec<ApprovalEntry>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        parse_ledger(&raw)
    }

    pub fn entry(&self, approval_id: &str) -> Result<Option<ApprovalEntry>> {
        Ok(self.entries()?.into_iter().find(|e| e.id == approval_id))
    }

    /// Read the current human decision for an entry.
    pub fn decision(&self, approval_id: &str) -> Result<ApprovalStatus> {
        self.entry(approval_id)?
            .map(|e| e.status)
            .ok_or_else(|| Error::Ledger(format!("no approval entry {}", approval_id)))
    }

    /// Record archival for an entry without destroying it: an indented
    /// `closed:` line is inserted below the entry block.
    pub fn close(&self, approval_id: &str, final_status: &str) -> Result<()> {
        let raw = std::fs::read_to_string(&self.path)?;
        let lines: Vec<&str> = raw.lines().collect();

        let mut header_idx = None;
        for (i, line) in lines.iter().enumerate() {
            if let Some(header) = parse_header(line) {
                if header.id == approval_id {
                    header_idx = Some(i);
                    break;
                }
            }
        }
        let start = header_idx
            .ok_or_else(|| Error::Ledger(format!("no approval entry {}", approval_id)))?;

        // The block ends at the first line that is neither indented nor empty
        // inside the run of continuation lines.
        let mut end = start + 1;
        while end < lines.len() && is_continuation(lines[end]) {
            end += 1;
        }

        let mut out: Vec<String> = lines[..end].iter().map(|s| s.to_string()).collect();
        out.push(format!("  closed: {}", final_status));
        out.extend(lines[end..].iter().map(|s| s.to_string()));
        std::fs::write(&self.path, out.join("\n") + "\n")?;
        Ok(())
    }

    /// Ids of entries still pending and not archived.
    pub fn list_pending(&self) -> Result<Vec<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.status == ApprovalStatus::Pending && e.is_open())
            .map(|e| e.id)
            .collect())
    }

    /// Duplicate-enqueue guard: an open entry already referencing this tool
    /// call, regardless of decision state.
    pub fn find_for_call(&self, call_id: &str) -> Result<Option<ApprovalEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|e| e.call_id == call_id && e.is_open()))
    }
}

struct Header {
    status: ApprovalStatus,
    id: String,
    tool: String,
    session_id: String,
    risk: RiskLevel,
    created_at: DateTime<Utc>,
}

fn parse_header(line: &str) -> Option<Header> {
    let rest = line.strip_prefix("- [")?;
    let marker = rest.chars().next()?;
    let status = ApprovalStatus::from_marker(marker)?;
    let rest = rest.get(1..)?.strip_prefix("] ")?;

    let fields: Vec<&str> = rest.split(" | ").map(str::trim).collect();
    if fields.len() < 5 {
        return None;
    }
    let created_at = DateTime::parse_from_rfc3339(fields[4])
        .ok()?
        .with_timezone(&Utc);
    Some(Header {
        status,
        id: fields[0].to_string(),
        tool: fields[1].to_string(),
        session_id: fields[2].to_string(),
        risk: fields[3].parse().ok()?,
        created_at,
    })
}

fn is_continuation(line: &str) -> bool {
    line.starts_with("  ") && !line.trim().is_empty()
}

fn parse_ledger(raw: &str) -> Result<Vec<ApprovalEntry>> {
    let mut entries = Vec::new();
    let mut current: Option<ApprovalEntry> = None;

    for line in raw.lines() {
        if let Some(header) = parse_header(line) {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(ApprovalEntry {
                id: header.id,
                tool: header.tool,
                session_id: header.session_id,
                risk: header.risk,
                created_at: header.created_at,
                status: header.status,
                call_id: String::new(),
                args: Value::Object(serde_json::Map::new()),
                description: String::new(),
                notes: Vec::new(),
                closed: None,
            });
            continue;
        }

        let Some(entry) = current.as_mut() else {
            continue;
        };
        if !is_continuation(line) {
            continue;
        }
        let body = line.trim_start();
        if let Some(call) = body.strip_prefix("call: ") {
            entry.call_id = call.trim().to_string();
        } else if let Some(args) = body.strip_prefix("args: ") {
            match serde_json::from_str(args.trim()) {
                Ok(parsed) => entry.args = parsed,
                Err(e) => {
                    // A mangled args line must not take down the whole
                    // ledger; the entry keeps its other machine fields
                    tracing::warn!("entry {}: unparseable args line: {}", entry.id, e);
                    entry.notes.push(body.to_string());
                }
            }
        } else if let Some(closed) = body.strip_prefix("closed: ") {
            entry.closed = Some(closed.trim().to_string());
        } else if entry.description.is_empty() {
            entry.description = body.to_string();
        } else {
            entry.notes.push(body.to_string());
        }
    }
    if let Some(entry) = current.take() {
        entries.push(entry);
    }
    Ok(entries)
}
