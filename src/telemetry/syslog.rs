//! Syslog mirror for audit records.
//!
//! When enabled, every audit record is also sent to the local syslog daemon
//! as one JSON event tagged `CPRSYNC`, for SIEM collection. The file log
//! stays the authoritative record.

use std::sync::Mutex;

use syslog::{Facility, Formatter3164};
use tracing::{debug, error};

use super::error::TelemetryError;
use super::events::AuditEvent;

/// Syslog tag for all audit events.
pub const SYSLOG_TAG: &str = "CPRSYNC";

/// Writes structured JSON events to syslog.
pub struct SyslogMirror {
    /// Syslog writer. `Logger` needs `&mut self`, the mirror is shared by `&`.
    writer: Mutex<syslog::Logger<syslog::LoggerBackend, Formatter3164>>,
}

impl SyslogMirror {
    /// Connect to the local syslog daemon over its Unix socket.
    pub fn connect() -> Result<Self, TelemetryError> {
        let formatter = Formatter3164 {
            facility: Facility::LOG_AUTH,
            hostname: None,
            process: SYSLOG_TAG.to_string(),
            pid: std::process::id(),
        };

        let writer = syslog::unix(formatter)
            .map_err(|e| TelemetryError::SyslogConnection(e.to_string()))?;

        debug!("Connected to syslog with tag '{}'", SYSLOG_TAG);
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    /// Send one event. Failures are returned, never panicked on.
    pub fn send(&self, event: &AuditEvent) -> Result<(), TelemetryError> {
        let json = serde_json::to_string(&event.with_timestamp())?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|e| TelemetryError::SendError(e.to_string()))?;
        writer
            .info(&json)
            .map_err(|e| TelemetryError::SendError(e.to_string()))?;

        debug!("Mirrored audit event to syslog: {}", json);
        Ok(())
    }

    /// Send one event, reporting (not propagating) any failure.
    pub fn log(&self, event: &AuditEvent) {
        if let Err(e) = self.send(event) {
            error!("Failed to mirror audit event to syslog: {}", e);
        }
    }
}
