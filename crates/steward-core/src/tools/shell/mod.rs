//! Shell execution tool and its allowlist

mod execute;

pub use execute::ExecuteCommand;

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Serialize, Deserialize, Default)]
struct AllowlistFile {
    #[serde(default)]
    patterns: Vec<String>,
}

/// Patterns describing shell commands that may run without human approval.
///
/// Loaded from `storage/terminal-cmd-allowlist.yaml`. A missing file means
/// nothing is allowlisted and every command is gated.
#[derive(Debug, Default)]
pub struct ShellAllowlist {
    patterns: Vec<Regex>,
}

impl ShellAllowlist {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = Regex::new(pattern)
                .map_err(|e| Error::Config(format!("bad allowlist pattern {:?}: {}", pattern, e)))?;
            compiled.push(regex);
        }
        Ok(Self { patterns: compiled })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::empty()),
            Err(e) => return Err(e.into()),
        };
        let file: AllowlistFile = serde_yml::from_str(&raw).map_err(|e| Error::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_patterns(file.patterns)
    }

    /// Whether the trimmed command matches any allowlist pattern.
    pub fn matches(&self, command: &str) -> bool {
        let trimmed = command.trim();
        self.patterns.iter().any(|p| p.is_match(trimmed))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
