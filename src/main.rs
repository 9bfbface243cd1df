//! cprsync: restricted rsync gateway for SSH forced-command keys
//!
//! This is the main entry point for the cprsync binary. It handles CLI
//! argument parsing, configuration loading and telemetry initialization,
//! then runs the gateway on `SSH_ORIGINAL_COMMAND`.
//!
//! # I/O Architecture
//!
//! sshd forwards this process's stderr to the remote client, and on allow
//! the process becomes rsync with stdin/stdout still attached to the
//! session:
//!
//! - **Audit logging**: Goes to the audit log file (and optionally syslog),
//!   never to stdout/stderr
//! - **Debug logging**: stderr, errors only unless raised with `-v`, so
//!   policy details do not reach the client
//! - **Refusals**: one fixed line on stderr plus a distinct exit code

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cprsync::{
    cli::Cli,
    config::{ConfigLoader, Settings},
    control::ControlPlaneClient,
    gateway::{self, EXIT_CONFIG, Gateway, ProcessExec, SSH_ORIGINAL_COMMAND},
    telemetry::{AuditLog, SyslogMirror},
};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse CLI arguments first (before any other initialization)
    let cli = Cli::parse();

    // Diagnostics only; the gateway works without them.
    let _ = init_tracing(cli.verbose);

    debug!("Parsed CLI arguments: {:?}", cli);

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    debug!("Loaded settings: {:?}", settings);

    let mut audit = AuditLog::new(&settings.log_path);
    if settings.syslog {
        match SyslogMirror::connect() {
            Ok(mirror) => audit = audit.with_mirror(mirror),
            Err(e) => warn!("Syslog mirror unavailable: {}", e),
        }
    }

    let gateway = Gateway::new(
        &settings,
        ControlPlaneClient::from_settings(&settings),
        audit,
        ProcessExec,
    );

    let raw = std::env::var_os(SSH_ORIGINAL_COMMAND);
    let outcome = gateway.run(raw.as_deref());

    gateway::conclude(outcome)
}

/// Load configuration with hierarchy merging.
fn load_settings(cli: &Cli) -> Result<Settings> {
    ConfigLoader::new()
        .load(cli)
        .context("Failed to load configuration")
}

/// Initialize the tracing subscriber for debug/development logging.
///
/// This is separate from the audit log. Everything here goes to stderr,
/// which the remote client sees, hence the quiet default.
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*};

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(tracing_filter(verbose))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

/// Filter for a verbosity level.
///
/// `RUST_LOG` is ignored: the client may be able to set environment
/// variables through sshd, and must not be able to raise the level.
///
/// # Verbosity Levels
/// - 0 (default): Errors only
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
fn tracing_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::new("error"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}
