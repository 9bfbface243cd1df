//! Command-line interface definitions for cprsync.
//!
//! Uses clap's derive API for type-safe argument parsing. These flags are
//! written by the administrator into the `command="…"` entry of
//! `authorized_keys`; the remote caller never controls them.

use clap::Parser;
use std::path::PathBuf;

/// Restricted rsync gateway for SSH forced-command keys.
///
/// cprsync reads the client's requested command from `SSH_ORIGINAL_COMMAND`,
/// checks the rsync destination against the directories published by the
/// local control plane (or a static `--dir`), records the decision in an
/// audit log, and then either execs the real rsync or refuses.
#[derive(Parser, Debug, Default)]
#[command(name = "cprsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the control plane's Unix socket.
    ///
    /// Default: `~/.local/cpmd/server.socket`.
    #[arg(short = 's', long = "socket", value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Path to the audit log file.
    ///
    /// Default: `/tmp/cprsync.log`.
    #[arg(short = 'l', long = "log", value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Static base directory into/from which rsync is allowed.
    ///
    /// When present the control plane is never queried.
    #[arg(short = 'd', long = "dir", value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Path to the real rsync binary.
    ///
    /// Default: `/usr/bin/rsync`.
    #[arg(long = "transfer-binary", value_name = "PATH")]
    pub transfer_binary: Option<PathBuf>,

    /// Timeout for the control-plane query in milliseconds.
    #[arg(long = "timeout-ms", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Path to additional config file.
    ///
    /// Merged on top of system and user configs; only CLI flags take
    /// precedence over it.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// Diagnostics go to stderr, which SSH forwards to the remote client, so
    /// only raise this while debugging on the host:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_flags() {
        let cli = Cli::parse_from(["cprsync"]);
        assert!(cli.socket.is_none());
        assert!(cli.log.is_none());
        assert!(cli.dir.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_parse_short_flags() {
        let cli = Cli::parse_from([
            "cprsync",
            "-s",
            "/run/cpmd.sock",
            "-l",
            "/var/log/cprsync.log",
            "-d",
            "/data",
            "-vv",
        ]);

        assert_eq!(cli.socket, Some(PathBuf::from("/run/cpmd.sock")));
        assert_eq!(cli.log, Some(PathBuf::from("/var/log/cprsync.log")));
        assert_eq!(cli.dir, Some(PathBuf::from("/data")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_parse_long_flags() {
        let cli = Cli::parse_from([
            "cprsync",
            "--socket",
            "/run/cpmd.sock",
            "--transfer-binary",
            "/opt/rsync/bin/rsync",
            "--timeout-ms",
            "750",
            "--config",
            "/etc/cprsync/alt.toml",
        ]);

        assert_eq!(
            cli.transfer_binary,
            Some(PathBuf::from("/opt/rsync/bin/rsync"))
        );
        assert_eq!(cli.timeout_ms, Some(750));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/cprsync/alt.toml")));
    }

    #[test]
    fn test_cli_rejects_positional_arguments() {
        let result = Cli::try_parse_from(["cprsync", "rsync", "--server"]);
        assert!(result.is_err());
    }
}
