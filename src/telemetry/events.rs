//! Audit event types for the structured syslog mirror.
//!
//! These events are logged to syslog with the `CPRSYNC` tag when the
//! `[audit] syslog` option is enabled.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Audit events for security logging.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Transfer allowed; the gateway is about to exec the transfer program.
    TransferAllow {
        /// Local account the key is bound to.
        user: String,
        /// Canonical destination.
        target: String,
        /// Which root matched.
        note: String,
    },

    /// Transfer denied after a policy evaluation.
    TransferDeny {
        /// Local account the key is bound to.
        user: String,
        /// Canonical (or best-effort anchored) destination.
        target: String,
        /// Why the transfer was denied.
        reason: DenyReason,
        /// Diagnostic detail.
        note: String,
    },

    /// Command rejected before any policy lookup.
    CommandReject {
        /// Local account the key is bound to.
        user: String,
        /// The raw requested command.
        command: String,
        /// Why the command shape was rejected.
        note: String,
    },

    /// The transfer program could not be exec'd after an ALLOW.
    ExecFailure {
        /// Local account the key is bound to.
        user: String,
        /// Program that failed to launch.
        program: String,
        /// Launch error.
        error: String,
    },
}

/// Reasons for denying a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No allowed root contains the target.
    NoMatchingRoot,
    /// The control plane could not supply a policy (fail-closed).
    PolicyUnavailable,
    /// The destination could not be canonicalized.
    UnresolvableTarget,
}

impl DenyReason {
    /// Short label used in the human-readable audit log.
    pub fn label(&self) -> &'static str {
        match self {
            DenyReason::NoMatchingRoot => "no matching root",
            DenyReason::PolicyUnavailable => "policy unavailable",
            DenyReason::UnresolvableTarget => "unresolvable target",
        }
    }
}

/// Wrapper for serializing events with timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent<'a> {
    /// ISO8601 timestamp.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// The actual event (flattened into this struct).
    #[serde(flatten)]
    pub event: &'a AuditEvent,
}

impl AuditEvent {
    /// Wrap this event with a timestamp for serialization.
    pub fn with_timestamp(&self) -> TimestampedEvent<'_> {
        TimestampedEvent {
            timestamp: Utc::now(),
            event: self,
        }
    }
}
