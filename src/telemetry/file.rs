//! Append-only audit log file.
//!
//! Many gateway processes may append to the same file at once. Each record
//! is rendered in full first, then written with a single `write_all` on an
//! `O_APPEND` descriptor while an exclusive `flock(2)` is held, and flushed
//! with `fdatasync` before the lock is released. Records therefore never
//! interleave or truncate one another.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use super::error::AuditError;
use super::events::AuditEvent;
use super::record::AuditRecord;
use super::syslog::SyslogMirror;

/// Permissions for a freshly created audit log.
const LOG_FILE_MODE: u32 = 0o600;

/// The audit log: one file plus an optional syslog mirror.
pub struct AuditLog {
    path: PathBuf,
    mirror: Option<SyslogMirror>,
}

impl AuditLog {
    /// Audit log writing to `path` only.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mirror: None,
        }
    }

    /// Also mirror every record to syslog.
    #[must_use]
    pub fn with_mirror(mut self, mirror: SyslogMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    ///
    /// The syslog mirror is best-effort and never turns a successful file
    /// append into an error.
    pub fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let block = record.render();
        self.append(block.as_bytes())?;
        debug!("Appended audit record to {:?}", self.path);

        if let Some(ref mirror) = self.mirror {
            mirror.log(&record.to_event());
        }
        Ok(())
    }

    /// Forward an out-of-band event (exec failure) to the syslog mirror.
    pub fn mirror_event(&self, event: &AuditEvent) {
        if let Some(ref mirror) = self.mirror {
            mirror.log(event);
        }
    }

    fn append(&self, bytes: &[u8]) -> Result<(), AuditError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(LOG_FILE_MODE)
            .open(&self.path)
            .map_err(|source| AuditError::Open {
                path: self.path.clone(),
                source,
            })?;

        let mut locked =
            Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, source)| AuditError::Lock {
                path: self.path.clone(),
                source,
            })?;

        let file: &mut File = &mut locked;
        file.write_all(bytes)
            .and_then(|()| file.sync_data())
            .map_err(|source| AuditError::Write {
                path: self.path.clone(),
                source,
            })?;

        // Dropping the guard releases the lock.
        Ok(())
    }
}
