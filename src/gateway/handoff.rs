//! Handing the connection over to the real transfer program.
//!
//! On allow the gateway replaces itself with the transfer program: the
//! argument vector is passed straight to `execve(2)`, never through a
//! shell. On every other outcome the process exits with a fixed,
//! policy-agnostic message and a code that tells supervisors which kind of
//! refusal it was.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use thiserror::Error;

use super::command::Invocation;

/// Exit code when policy denies the transfer.
pub const EXIT_DENIED: u8 = 13;

/// Exit code when the command is not an rsync server invocation (`EX_USAGE`).
pub const EXIT_MALFORMED: u8 = 64;

/// Exit code when configuration cannot be loaded (`EX_CONFIG`).
pub const EXIT_CONFIG: u8 = 78;

/// Exit code when the transfer program cannot be launched.
pub const EXIT_EXEC_FAILURE: u8 = 126;

/// Message for a denied transfer.
pub const DENIED_MESSAGE: &str = "Access DENIED!";

/// Message for a command that is not an rsync transfer.
pub const REJECTED_MESSAGE: &str = "You can ONLY use rsync using this ssh key!";

/// Message for a transfer program that could not be started.
pub const EXEC_FAILURE_MESSAGE: &str = "Transfer could not be started.";

/// Terminal state of one gateway run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Command rejected before policy evaluation.
    Rejected,
    /// Policy denied the transfer.
    Denied,
    /// Allowed, but the transfer program could not be launched.
    ExecFailed,
    /// The process image was handed to the transfer program.
    ///
    /// Only observable with a non-replacing [`ExecBackend`].
    HandedOff,
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Rejected => EXIT_MALFORMED,
            Outcome::Denied => EXIT_DENIED,
            Outcome::ExecFailed => EXIT_EXEC_FAILURE,
            Outcome::HandedOff => 0,
        }
    }

    /// The fixed message shown to the remote client, if any.
    pub fn message(self) -> Option<&'static str> {
        match self {
            Outcome::Rejected => Some(REJECTED_MESSAGE),
            Outcome::Denied => Some(DENIED_MESSAGE),
            Outcome::ExecFailed => Some(EXEC_FAILURE_MESSAGE),
            Outcome::HandedOff => None,
        }
    }
}

/// Write the outcome's message to stderr and turn it into an exit code.
pub fn conclude(outcome: Outcome) -> ExitCode {
    if let Some(message) = outcome.message() {
        // Nothing left to report to if stderr itself is gone.
        let _ = writeln!(io::stderr(), "{message}");
    }
    ExitCode::from(outcome.exit_code())
}

/// Errors locating the transfer program.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program path does not resolve.
    #[error("transfer program {path:?} not found: {source}")]
    NotFound {
        /// Configured path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The program path is not a regular file.
    #[error("transfer program {path:?} is not a regular file")]
    NotAFile {
        /// Canonical path.
        path: PathBuf,
    },

    /// The program has no execute permission bits.
    #[error("transfer program {path:?} is not executable")]
    NotExecutable {
        /// Canonical path.
        path: PathBuf,
    },
}

/// Canonical path of an executable regular file.
pub fn locate_program(path: &Path) -> Result<PathBuf, ExecError> {
    let canonical = fs::canonicalize(path).map_err(|source| ExecError::NotFound {
        path: path.to_path_buf(),
        source,
    })?;

    let metadata = fs::metadata(&canonical).map_err(|source| ExecError::NotFound {
        path: canonical.clone(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(ExecError::NotAFile { path: canonical });
    }
    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(ExecError::NotExecutable { path: canonical });
    }

    Ok(canonical)
}

/// The invocation's tokens with the program and destination replaced.
///
/// Every other token is passed through unchanged.
pub fn rewrite_argv(invocation: &Invocation, program: &Path, target: &Path) -> Vec<OsString> {
    let tokens = invocation.tokens();
    let mut argv: Vec<OsString> = tokens.iter().map(OsString::from).collect();

    if let Some(first) = argv.first_mut() {
        *first = program.as_os_str().to_os_string();
    }
    if let Some(last) = argv.last_mut() {
        *last = target.as_os_str().to_os_string();
    }
    argv
}

/// Replaces the current process with another program.
pub trait ExecBackend {
    /// Run `program` with `argv` (`argv[0]` included) in place of this
    /// process. Returns only on failure, or when the backend does not
    /// really replace the process.
    fn replace_process(&self, program: &Path, argv: &[OsString]) -> io::Result<()>;
}

/// `execve(2)` through [`CommandExt::exec`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExec;

impl ExecBackend for ProcessExec {
    fn replace_process(&self, program: &Path, argv: &[OsString]) -> io::Result<()> {
        let mut command = Command::new(program);
        if let Some((arg0, rest)) = argv.split_first() {
            command.arg0(arg0).args(rest);
        }
        Err(command.exec())
    }
}
