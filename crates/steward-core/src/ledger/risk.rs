//! Risk classification for gated actions
//!
//! Strategy mirrors the shell safety checker: conservative pattern matching
//! over the proposed action. A misclassification upward only costs the human
//! an extra glance at the ledger.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::RegexSet;
use serde_json::Value;

/// Risk class recorded on every approval entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {}", other)),
        }
    }
}

fn high_shell_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            // recursive delete
            r"(?i)(^|[\s;&|])rm\s+(-\w+\s+)*-\w*r",
            r"(?i)(^|[\s;&|])rmdir\b",
            // privilege escalation
            r"(?i)(^|[\s;&|])sudo\b",
            r"(?i)(^|[\s;&|])su\b",
            // permission / ownership changes
            r"(?i)(^|[\s;&|])chmod\b",
            r"(?i)(^|[\s;&|])chown\b",
            // shutdown family
            r"(?i)(^|[\s;&|])(shutdown|reboot|halt|poweroff)\b",
            // raw block-device writes
            r"(?i)(^|[\s;&|])dd\b.*\bof=/dev/",
            r"(?i)(^|[\s;&|])mkfs",
            // mass kill
            r"(?i)(^|[\s;&|])(killall|pkill)\b",
            r"(?i)kill\s+-9\s+-1\b",
        ])
        .expect("high-risk shell patterns are valid regexes")
    })
}

fn medium_shell_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            // package installation
            r"(?i)(^|[\s;&|])(apt(-get)?|yum|dnf|brew|pacman)\s+(\S+\s+)*install\b",
            r"(?i)(^|[\s;&|])(pip3?|npm|cargo|gem)\s+install\b",
            // destructive version control
            r"(?i)git\s+push\s+.*(--force|-f)\b",
            r"(?i)git\s+reset\s+--hard",
            r"(?i)git\s+clean\b",
            r"(?i)git\s+branch\s+-D\b",
            // container / orchestration mutation
            r"(?i)docker\s+(rm|rmi|kill|stop|restart|prune|system\s+prune)\b",
            r"(?i)kubectl\s+(delete|apply|drain|cordon|scale)\b",
            // service control
            r"(?i)systemctl\s+(start|stop|restart|enable|disable|mask)\b",
            r"(?i)(^|[\s;&|])service\s+\S+\s+(start|stop|restart)\b",
        ])
        .expect("medium-risk shell patterns are valid regexes")
    })
}

fn critical_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.starts_with("/etc")
        || lower.starts_with("/boot")
        || lower.contains("/.ssh")
        || lower.contains("/.aws")
        || lower.contains("/.gnupg")
        || lower.contains(".env")
        || lower.contains("secret")
        || lower.contains("password")
}

/// Classify a shell command by its pattern.
pub fn classify_command(command: &str) -> RiskLevel {
    if high_shell_patterns().is_match(command) {
        RiskLevel::High
    } else if medium_shell_patterns().is_match(command) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Classify a gated tool call for the approval ledger.
pub fn classify(tool_name: &str, args: &Value) -> RiskLevel {
    match tool_name {
        "execute_command" => {
            let command = args.get("command").and_then(|v| v.as_str()).unwrap_or("");
            classify_command(command)
        }
        "write_file" => {
            let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
            if critical_path(path) {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            }
        }
        // Outbound external messages
        "slack_send" => RiskLevel::Medium,
        // Rewriting another session's transcript is a file write
        "edit_session" => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}
