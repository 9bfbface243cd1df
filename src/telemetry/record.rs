//! The human-readable audit record.
//!
//! One record is one self-delimited block:
//!
//! ```text
//! ---------------------------------------------------------
//! time:     [2026-10-16 14:32:01.123456 +02:00]
//! user:     alice (pid 4242)
//!
//! original ssh command:
//!   [rsync --server -logDtpre.iLsfxC . p1/sub]
//!
//! new command:
//!   - /usr/bin/rsync
//!   - --server
//!   - -logDtpre.iLsfxC
//!   - .
//!   - /srv/projects/p1/sub
//!
//! policy source: control plane at /home/alice/.local/cpmd/server.socket
//! decision:      ALLOW
//! note:          matched root p1: /srv/projects/p1
//!
//! allowed roots:
//!   p1: /srv/projects/p1
//!
//! ```
//!
//! Every untrusted string is escaped with [`str::escape_debug`], so a
//! newline smuggled into the command cannot start a forged block.

use std::fmt::Write as _;

use chrono::{DateTime, Local};

use super::events::{AuditEvent, DenyReason};

/// Line that opens every record.
pub const RECORD_SEPARATOR: &str = "---------------------------------------------------------";

/// Outcome written into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The transfer program is about to be exec'd.
    Allow,
    /// Policy evaluation denied the transfer.
    Deny(DenyReason),
    /// The command was rejected before any policy lookup.
    Rejected,
}

impl RecordOutcome {
    fn label(&self) -> String {
        match self {
            RecordOutcome::Allow => "ALLOW".to_string(),
            RecordOutcome::Deny(reason) => format!("DENY ({})", reason.label()),
            RecordOutcome::Rejected => "REJECTED".to_string(),
        }
    }
}

/// One audit record.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    /// Wall-clock time of the decision.
    pub timestamp: DateTime<Local>,
    /// Local account the key is bound to.
    pub user: String,
    /// Gateway process id.
    pub pid: u32,
    /// The raw `SSH_ORIGINAL_COMMAND`.
    pub raw_command: String,
    /// Argument vector that is (or would have been) exec'd. Empty on rejection.
    pub argv: Vec<String>,
    /// Canonical target, when one was derived.
    pub target: Option<String>,
    /// Outcome of the evaluation.
    pub outcome: RecordOutcome,
    /// Diagnostic note.
    pub note: String,
    /// Where the policy came from.
    pub policy_source: String,
    /// Policy snapshot as `(name, root)` pairs.
    pub roots: Vec<(String, String)>,
}

impl AuditRecord {
    /// Start a record for the current process with the given outcome.
    pub fn new(raw_command: impl Into<String>, outcome: RecordOutcome) -> Self {
        Self {
            timestamp: Local::now(),
            user: current_user(),
            pid: std::process::id(),
            raw_command: raw_command.into(),
            argv: Vec::new(),
            target: None,
            outcome,
            note: String::new(),
            policy_source: "not consulted".to_string(),
            roots: Vec::new(),
        }
    }

    /// Render the record as one self-contained text block.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(512);

        // Writing into a String cannot fail.
        let _ = writeln!(out, "{RECORD_SEPARATOR}");
        let _ = writeln!(
            out,
            "time:     [{}]",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f %:z")
        );
        let _ = writeln!(out, "user:     {} (pid {})", escape(&self.user), self.pid);
        out.push('\n');

        let _ = writeln!(out, "original ssh command:");
        let _ = writeln!(out, "  [{}]", escape(&self.raw_command));
        out.push('\n');

        let _ = writeln!(out, "new command:");
        if self.argv.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for arg in &self.argv {
            let _ = writeln!(out, "  - {}", escape(arg));
        }
        out.push('\n');

        if let Some(ref target) = self.target {
            let _ = writeln!(out, "target:        {}", escape(target));
        }
        let _ = writeln!(out, "policy source: {}", escape(&self.policy_source));
        let _ = writeln!(out, "decision:      {}", self.outcome.label());
        let _ = writeln!(out, "note:          {}", escape(&self.note));
        out.push('\n');

        let _ = writeln!(out, "allowed roots:");
        if self.roots.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for (name, root) in &self.roots {
            let _ = writeln!(out, "  {}: {}", escape(name), escape(root));
        }
        out.push('\n');

        out
    }

    /// The structured event mirrored to syslog for this record.
    pub fn to_event(&self) -> AuditEvent {
        let target = self.target.clone().unwrap_or_default();
        match self.outcome {
            RecordOutcome::Allow => AuditEvent::TransferAllow {
                user: self.user.clone(),
                target,
                note: self.note.clone(),
            },
            RecordOutcome::Deny(reason) => AuditEvent::TransferDeny {
                user: self.user.clone(),
                target,
                reason,
                note: self.note.clone(),
            },
            RecordOutcome::Rejected => AuditEvent::CommandReject {
                user: self.user.clone(),
                command: self.raw_command.clone(),
                note: self.note.clone(),
            },
        }
    }
}

/// Get the current username for audit logging.
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn escape(s: &str) -> String {
    s.escape_debug().to_string()
}
