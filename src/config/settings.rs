//! The immutable runtime settings handed to every gateway component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ConfigError;
use super::schema::Config;

/// Default control-plane socket, relative to the home directory.
pub const DEFAULT_SOCKET_PATH: &str = "~/.local/cpmd/server.socket";

/// Default audit log location.
pub const DEFAULT_LOG_PATH: &str = "/tmp/cprsync.log";

/// Default transfer binary exec'd on ALLOW.
pub const DEFAULT_TRANSFER_BINARY: &str = "/usr/bin/rsync";

/// Default file name expected in the first command token.
pub const DEFAULT_PROGRAM_NAME: &str = "rsync";

/// Default bound on the policy round trip.
pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;

/// Default bound on the `/projects` response body.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// Fully resolved configuration for one gateway invocation.
///
/// Built once at start-up and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Control-plane Unix socket.
    pub socket_path: PathBuf,
    /// Audit log file.
    pub log_path: PathBuf,
    /// Static override directory; disables the control-plane query.
    pub override_dir: Option<PathBuf>,
    /// Real transfer binary.
    pub transfer_binary: PathBuf,
    /// File name the first command token must carry.
    pub program_name: String,
    /// Bound on the policy exchange.
    pub policy_timeout: Duration,
    /// Bound on the policy response body.
    pub max_response_bytes: usize,
    /// Home directory of the invoking user, anchor for relative targets.
    pub home_dir: Option<PathBuf>,
    /// Whether rejected commands are audited too.
    pub record_rejections: bool,
    /// Whether audit records are mirrored to syslog.
    pub syslog: bool,
}

impl Settings {
    /// Apply defaults and path normalisation to a merged [`Config`].
    pub fn from_config(config: Config, home_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        let home = home_dir.as_deref();

        let socket_path = config
            .control_plane
            .socket_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH));
        let log_path = config
            .audit
            .log_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH));
        let transfer_binary = config
            .gateway
            .transfer_binary
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TRANSFER_BINARY));

        let program_name = config
            .gateway
            .program_name
            .unwrap_or_else(|| DEFAULT_PROGRAM_NAME.to_string());
        if program_name.is_empty() || program_name.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "gateway.program_name".to_string(),
                message: "must be a bare file name".to_string(),
            });
        }

        let timeout_ms = config.control_plane.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "control_plane.timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let max_response_bytes = config
            .control_plane
            .max_response_bytes
            .unwrap_or(DEFAULT_MAX_RESPONSE_BYTES);
        if max_response_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "control_plane.max_response_bytes".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let override_dir = config
            .gateway
            .allowed_dir
            .map(|dir| normalize_path("gateway.allowed_dir", &dir, home))
            .transpose()?;

        Ok(Self {
            socket_path: normalize_path("control_plane.socket_path", &socket_path, home)?,
            log_path: normalize_path("audit.log_path", &log_path, home)?,
            override_dir,
            transfer_binary: normalize_path("gateway.transfer_binary", &transfer_binary, home)?,
            program_name,
            policy_timeout: Duration::from_millis(timeout_ms),
            max_response_bytes,
            home_dir,
            record_rejections: config.audit.record_rejections.unwrap_or(true),
            syslog: config.audit.syslog.unwrap_or(false),
        })
    }
}

/// Expand a leading `~` and make the path absolute.
fn normalize_path(field: &str, path: &Path, home: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let expanded = expand_tilde(path, home).ok_or_else(|| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("cannot expand '~' in {} without a home directory", path.display()),
    })?;

    std::path::absolute(&expanded).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("cannot make {} absolute: {}", expanded.display(), e),
    })
}

/// Replace a leading `~` component with the home directory.
///
/// Returns `None` only when the path needs a home directory and none is known.
fn expand_tilde(path: &Path, home: Option<&Path>) -> Option<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => home.map(|h| h.join(rest)),
        Err(_) => Some(path.to_path_buf()),
    }
}
