//! Telemetry and audit logging for cprsync.
//!
//! # Architecture
//!
//! - **Audit log** (file): one human-readable block per decision, appended
//!   under an exclusive lock. This is the authoritative record.
//! - **Syslog mirror** (optional): the same decision as a JSON event with
//!   the `CPRSYNC` tag, for SIEM integration.
//! - **Diagnostics** (tracing): development logs to stderr, silent by default
//!   because SSH forwards stderr to the remote client.
//!
//! A failure to write the audit log is reported but never changes the
//! decision that was already made.
//!
//! # Event Format
//!
//! ```json
//! {"ts":"2026-10-16T14:32:01Z","event":"transfer_deny","user":"alice","target":"/etc/passwd","reason":"no_matching_root","note":"no allowed root contains the target"}
//! ```

mod error;
mod events;
mod file;
mod record;
mod syslog;

pub use error::{AuditError, TelemetryError};
pub use events::{AuditEvent, DenyReason};
pub use file::AuditLog;
pub use record::{AuditRecord, RECORD_SEPARATOR, RecordOutcome, current_user};
pub use syslog::{SYSLOG_TAG, SyslogMirror};
