//! Configuration loading with hierarchy merging.
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. Built-in defaults
//! 2. System config: `/etc/cprsync/config.toml`
//! 3. User config: `~/.config/cprsync/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (highest priority)
//!
//! Scalars set by a later source override earlier ones.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ConfigError;
use super::schema::{AuditConfig, Config, ControlPlaneConfig, GatewayConfig};
use super::settings::Settings;
use crate::cli::Cli;

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/cprsync/config.toml";

/// User configuration directory name.
pub const USER_CONFIG_DIR: &str = "cprsync";

/// User configuration filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Configuration loader with support for hierarchy merging.
pub struct ConfigLoader {
    /// Path to system-wide configuration.
    system_path: PathBuf,
    /// Path to user configuration.
    user_path: PathBuf,
    /// Home directory of the invoking user.
    home_dir: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new ConfigLoader with default paths.
    #[must_use]
    pub fn new() -> Self {
        let user_config_dir = dirs::config_dir()
            .map(|p| p.join(USER_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_CONFIG_DIR));

        Self {
            system_path: PathBuf::from(SYSTEM_CONFIG_PATH),
            user_path: user_config_dir.join(USER_CONFIG_FILE),
            home_dir: dirs::home_dir(),
        }
    }

    /// Create a ConfigLoader with custom paths (for testing).
    #[must_use]
    pub fn with_paths(system_path: PathBuf, user_path: PathBuf, home_dir: Option<PathBuf>) -> Self {
        Self {
            system_path,
            user_path,
            home_dir,
        }
    }

    /// Load and merge configuration from all sources into [`Settings`].
    ///
    /// Missing system and user files are skipped. Invalid TOML is an error,
    /// and so is a `--config` file that does not exist.
    pub fn load(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = Config::default();

        if let Some(system_config) = self.load_file(&self.system_path)? {
            config.merge(system_config);
            debug!("Loaded system config from {:?}", self.system_path);
        } else {
            debug!("No system config found at {:?}", self.system_path);
        }

        if let Some(user_config) = self.load_file(&self.user_path)? {
            config.merge(user_config);
            debug!("Loaded user config from {:?}", self.user_path);
        } else {
            debug!("No user config found at {:?}", self.user_path);
        }

        if let Some(ref cli_config_path) = cli.config {
            match self.load_file(cli_config_path)? {
                Some(cli_config) => {
                    config.merge(cli_config);
                    debug!("Loaded additional config from {:?}", cli_config_path);
                }
                None => {
                    // Unlike system/user config, a missing CLI-specified config is an error
                    return Err(ConfigError::ReadError {
                        path: cli_config_path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "Specified config file not found",
                        ),
                    });
                }
            }
        }

        config.merge(Self::cli_overrides(cli));

        Settings::from_config(config, self.home_dir.clone())
    }

    /// Express the CLI flags as a config layer.
    fn cli_overrides(cli: &Cli) -> Config {
        Config {
            gateway: GatewayConfig {
                transfer_binary: cli.transfer_binary.clone(),
                program_name: None,
                allowed_dir: cli.dir.clone(),
            },
            control_plane: ControlPlaneConfig {
                socket_path: cli.socket.clone(),
                timeout_ms: cli.timeout_ms,
                max_response_bytes: None,
            },
            audit: AuditConfig {
                log_path: cli.log.clone(),
                record_rejections: None,
                syslog: None,
            },
        }
    }

    /// Load a config file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<Config>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config =
                    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn loader_in(dir: &Path) -> ConfigLoader {
        ConfigLoader::with_paths(
            dir.join("system.toml"),
            dir.join("user.toml"),
            Some(PathBuf::from("/home/alice")),
        )
    }

    #[test]
    fn test_missing_files_use_defaults() {
        let dir = tempdir().unwrap();
        let settings = loader_in(dir.path()).load(&Cli::default()).unwrap();

        assert_eq!(
            settings.socket_path,
            PathBuf::from("/home/alice/.local/cpmd/server.socket")
        );
        assert_eq!(settings.log_path, PathBuf::from("/tmp/cprsync.log"));
        assert!(settings.override_dir.is_none());
    }

    #[test]
    fn test_user_config_overrides_system() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("system.toml"),
            "[control_plane]\ntimeout_ms = 600\nsocket_path = \"/run/system.sock\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("user.toml"),
            "[control_plane]\ntimeout_ms = 900\n",
        )
        .unwrap();

        let settings = loader_in(dir.path()).load(&Cli::default()).unwrap();

        assert_eq!(settings.policy_timeout, Duration::from_millis(900));
        assert_eq!(settings.socket_path, PathBuf::from("/run/system.sock"));
    }

    #[test]
    fn test_cli_flags_override_files() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("user.toml"),
            "[gateway]\nallowed_dir = \"/srv/from-file\"\n[audit]\nlog_path = \"/var/log/a.log\"\n",
        )
        .unwrap();

        let cli = Cli {
            dir: Some(PathBuf::from("/data")),
            log: Some(PathBuf::from("/var/log/b.log")),
            ..Default::default()
        };
        let settings = loader_in(dir.path()).load(&cli).unwrap();

        assert_eq!(settings.override_dir, Some(PathBuf::from("/data")));
        assert_eq!(settings.log_path, PathBuf::from("/var/log/b.log"));
    }

    #[test]
    fn test_additional_config_file_is_merged() {
        let dir = tempdir().unwrap();
        let extra = dir.path().join("extra.toml");
        fs::write(&extra, "[audit]\nrecord_rejections = false\nsyslog = true\n").unwrap();

        let cli = Cli {
            config: Some(extra),
            ..Default::default()
        };
        let settings = loader_in(dir.path()).load(&cli).unwrap();

        assert!(!settings.record_rejections);
        assert!(settings.syslog);
    }

    #[test]
    fn test_missing_cli_config_is_error() {
        let dir = tempdir().unwrap();
        let cli = Cli {
            config: Some(dir.path().join("absent.toml")),
            ..Default::default()
        };

        let result = loader_in(dir.path()).load(&cli);
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), "this is not valid TOML [[[").unwrap();

        let result = loader_in(dir.path()).load(&Cli::default());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
