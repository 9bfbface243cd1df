//! Telemetry error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while appending an audit record.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit log could not be opened.
    #[error("Failed to open audit log {path}: {source}")]
    Open {
        /// Path of the audit log.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The exclusive append lock could not be taken.
    #[error("Failed to lock audit log {path}: {source}")]
    Lock {
        /// Path of the audit log.
        path: PathBuf,
        /// The errno returned by `flock(2)`.
        source: nix::errno::Errno,
    },

    /// The record could not be written or flushed.
    #[error("Failed to write audit log {path}: {source}")]
    Write {
        /// Path of the audit log.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors from the syslog mirror.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to connect to syslog.
    #[error("Failed to connect to syslog: {0}")]
    SyslogConnection(String),

    /// Failed to send log message.
    #[error("Failed to send log message: {0}")]
    SendError(String),

    /// Failed to serialize event to JSON.
    #[error("Failed to serialize event: {0}")]
    SerializationError(#[from] serde_json::Error),
}
