//! Configuration system for cprsync.
//!
//! This module provides TOML configuration loading with hierarchy merging
//! and turns the merged result into one immutable [`Settings`] value.
//!
//! # Configuration Hierarchy
//!
//! 1. System config: `/etc/cprsync/config.toml`
//! 2. User config: `~/.config/cprsync/config.toml`
//! 3. Additional config file (via `--config` flag)
//! 4. CLI flags (highest priority)
//!
//! None of the files is required; every value has a built-in default.
//!
//! ```toml
//! [gateway]
//! transfer_binary = "/usr/bin/rsync"
//! allowed_dir = "/data"
//!
//! [control_plane]
//! socket_path = "~/.local/cpmd/server.socket"
//! timeout_ms = 2000
//!
//! [audit]
//! log_path = "/tmp/cprsync.log"
//! ```

mod error;
mod loader;
mod schema;
mod settings;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{AuditConfig, Config, ControlPlaneConfig, GatewayConfig};
pub use settings::{
    DEFAULT_LOG_PATH, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_PROGRAM_NAME, DEFAULT_SOCKET_PATH,
    DEFAULT_TIMEOUT_MS, DEFAULT_TRANSFER_BINARY, Settings,
};
