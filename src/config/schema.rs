//! Configuration schema definitions.
//!
//! This module defines the structure of the cprsync configuration files.
//! Every field is optional so that a later file only overrides what it
//! actually sets; unset fields fall through to built-in defaults when the
//! [`Settings`](super::Settings) value is assembled.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Gateway settings (transfer program, static override).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Control-plane connection settings.
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    /// Audit log settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Config {
    /// Merge another config into this one.
    ///
    /// Scalars set in `other` override the values in `self`.
    pub fn merge(&mut self, other: Config) {
        self.gateway.merge(other.gateway);
        self.control_plane.merge(other.control_plane);
        self.audit.merge(other.audit);
    }
}

/// Transfer program and override settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Path to the real transfer binary that is exec'd on ALLOW.
    pub transfer_binary: Option<PathBuf>,

    /// File name the first command token must carry (e.g. `rsync`).
    pub program_name: Option<String>,

    /// Static allowed directory. When set, the control plane is never queried.
    pub allowed_dir: Option<PathBuf>,
}

impl GatewayConfig {
    fn merge(&mut self, other: GatewayConfig) {
        if other.transfer_binary.is_some() {
            self.transfer_binary = other.transfer_binary;
        }
        if other.program_name.is_some() {
            self.program_name = other.program_name;
        }
        if other.allowed_dir.is_some() {
            self.allowed_dir = other.allowed_dir;
        }
    }
}

/// Control-plane connection settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ControlPlaneConfig {
    /// Path to the control plane's Unix socket.
    pub socket_path: Option<PathBuf>,

    /// Upper bound for the whole policy exchange in milliseconds.
    pub timeout_ms: Option<u64>,

    /// Upper bound on the size of the `/projects` response body.
    pub max_response_bytes: Option<usize>,
}

impl ControlPlaneConfig {
    fn merge(&mut self, other: ControlPlaneConfig) {
        if other.socket_path.is_some() {
            self.socket_path = other.socket_path;
        }
        if other.timeout_ms.is_some() {
            self.timeout_ms = other.timeout_ms;
        }
        if other.max_response_bytes.is_some() {
            self.max_response_bytes = other.max_response_bytes;
        }
    }
}

/// Audit log settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Path of the append-only audit log.
    pub log_path: Option<PathBuf>,

    /// Also write a record for commands rejected before any policy lookup.
    pub record_rejections: Option<bool>,

    /// Mirror every record to syslog as a JSON event.
    pub syslog: Option<bool>,
}

impl AuditConfig {
    fn merge(&mut self, other: AuditConfig) {
        if other.log_path.is_some() {
            self.log_path = other.log_path;
        }
        if other.record_rejections.is_some() {
            self.record_rejections = other.record_rejections;
        }
        if other.syslog.is_some() {
            self.syslog = other.syslog;
        }
    }
}
