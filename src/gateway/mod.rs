//! The forced-command gateway.
//!
//! One run takes the client's requested command through
//! parse → resolve → policy → authorize → audit → hand-off, exactly once:
//!
//! - A command that is not an rsync server invocation is rejected before
//!   any filesystem or network access.
//! - A destination that cannot be resolved is denied without a policy fetch.
//! - Every decision is written to the audit log before the process exits
//!   or is replaced.
//! - Nothing is retried.

mod authorize;
mod command;
mod handoff;
mod path;
mod policy;

pub use authorize::{Decision, Verdict, authorize, contains};
pub use command::{CommandError, CommandParser, Invocation, MIN_TOKENS, SSH_ORIGINAL_COMMAND};
pub use handoff::{
    DENIED_MESSAGE, EXEC_FAILURE_MESSAGE, EXIT_CONFIG, EXIT_DENIED, EXIT_EXEC_FAILURE,
    EXIT_MALFORMED, ExecBackend, ExecError, Outcome, ProcessExec, REJECTED_MESSAGE, conclude,
    locate_program, rewrite_argv,
};
pub use path::{PathResolver, ResolveError, ResolvedTarget};
pub use policy::{
    AllowedRoot, OVERRIDE_NAME, PolicyOrigin, PolicySet, PolicySource, ProjectSource,
};

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::telemetry::{AuditEvent, AuditLog, AuditRecord, RecordOutcome, current_user};

/// Policy source line for a decision that never reached the policy.
const NOT_CONSULTED: &str = "not consulted";

/// One configured gateway.
pub struct Gateway<'a, S, E> {
    settings: &'a Settings,
    parser: CommandParser,
    resolver: PathResolver,
    policy: PolicySource<S>,
    audit: AuditLog,
    exec: E,
}

impl<'a, S: ProjectSource, E: ExecBackend> Gateway<'a, S, E> {
    /// Assemble a gateway from its settings and collaborators.
    pub fn new(settings: &'a Settings, source: S, audit: AuditLog, exec: E) -> Self {
        Self {
            settings,
            parser: CommandParser::new(settings.program_name.clone()),
            resolver: PathResolver::new(settings.home_dir.clone()),
            policy: PolicySource::new(source),
            audit,
            exec,
        }
    }

    /// Process the raw `SSH_ORIGINAL_COMMAND` value.
    ///
    /// With [`ProcessExec`] an allowed transfer never returns.
    pub fn run(&self, raw: Option<&OsStr>) -> Outcome {
        let invocation = match self.parser.parse_env(raw) {
            Ok(invocation) => invocation,
            Err(e) => {
                info!("Rejected command: {}", e);
                self.reject(raw, &e);
                return Outcome::Rejected;
            }
        };
        debug!("Parsed invocation {:?}", invocation.tokens());

        let decision = self.decide(&invocation);
        info!("Decision for {:?}: {}", decision.target, decision.note);

        // The record shows the canonical program that is about to run.
        let program = locate_program(&self.settings.transfer_binary);
        let program_path = match program {
            Ok(ref path) => path.clone(),
            Err(_) => self.settings.transfer_binary.clone(),
        };
        let argv = rewrite_argv(&invocation, &program_path, &decision.target);

        let mut record = self.record_for(&invocation, &decision, &argv);
        if decision.is_allowed()
            && let Err(ref e) = program
        {
            record.note.push_str(&format!("; {e}"));
        }
        self.write(&record);

        if !decision.is_allowed() {
            return Outcome::Denied;
        }

        let program = match program {
            Ok(program) => program,
            Err(e) => {
                warn!("Cannot launch transfer program: {}", e);
                self.exec_failed(&program_path, &e);
                return Outcome::ExecFailed;
            }
        };

        debug!("Handing off to {:?}", program);
        match self.exec.replace_process(&program, &argv) {
            Ok(()) => Outcome::HandedOff,
            Err(e) => {
                warn!("exec of {:?} failed: {}", program, e);
                self.exec_failed(&program, &e);
                Outcome::ExecFailed
            }
        }
    }

    /// Resolve, fetch policy, authorize.
    fn decide(&self, invocation: &Invocation) -> Decision {
        let target = match self.resolver.resolve(invocation.destination()) {
            Ok(target) => target,
            Err(e) => {
                info!("Destination {:?} unresolvable: {}", invocation.destination(), e);
                return Decision::unresolvable(PathBuf::from(invocation.destination()), &e);
            }
        };

        let policy = self
            .policy
            .resolve_allowed_roots(self.settings.override_dir.as_deref());
        authorize(target.as_path(), policy)
    }

    /// The audit record's account of where the policy came from.
    fn policy_source(&self, policy: &PolicySet) -> String {
        match policy.origin() {
            PolicyOrigin::Override => match policy.roots().first() {
                Some(root) => format!("{OVERRIDE_NAME} {}", root.path.display()),
                None => OVERRIDE_NAME.to_string(),
            },
            PolicyOrigin::ControlPlane => self.policy.describe(),
            PolicyOrigin::NotConsulted => NOT_CONSULTED.to_string(),
        }
    }

    fn record_for(
        &self,
        invocation: &Invocation,
        decision: &Decision,
        argv: &[OsString],
    ) -> AuditRecord {
        let outcome = match decision.verdict {
            Verdict::Allow { .. } => RecordOutcome::Allow,
            Verdict::Deny { reason } => RecordOutcome::Deny(reason),
        };

        let mut record = AuditRecord::new(invocation.raw(), outcome);
        record.argv = argv
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        record.target = Some(decision.target.display().to_string());
        record.note = decision.note.clone();
        record.policy_source = self.policy_source(&decision.policy);
        record.roots = decision.policy.snapshot();
        record
    }

    fn reject(&self, raw: Option<&OsStr>, cause: &CommandError) {
        if !self.settings.record_rejections {
            return;
        }
        let raw = raw
            .map(|raw| raw.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut record = AuditRecord::new(raw, RecordOutcome::Rejected);
        record.note = cause.to_string();
        self.write(&record);
    }

    fn exec_failed(&self, program: &std::path::Path, cause: &dyn std::fmt::Display) {
        self.audit.mirror_event(&AuditEvent::ExecFailure {
            user: current_user(),
            program: program.display().to_string(),
            error: cause.to_string(),
        });
    }

    /// Audit failures are reported but never change the outcome.
    fn write(&self, record: &AuditRecord) {
        if let Err(e) = self.audit.record(record) {
            error!("Failed to write audit record: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Settings};
    use crate::control::{FetchError, ProjectMap};
    use std::cell::{Cell, RefCell};
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    struct FixedSource {
        projects: Option<ProjectMap>,
        calls: Cell<usize>,
    }

    impl ProjectSource for &FixedSource {
        fn fetch_projects(&self) -> Result<ProjectMap, FetchError> {
            self.calls.set(self.calls.get() + 1);
            self.projects
                .clone()
                .ok_or(FetchError::Status(503))
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    #[derive(Default)]
    struct RecordingExec {
        calls: RefCell<Vec<(PathBuf, Vec<OsString>)>>,
    }

    impl ExecBackend for &RecordingExec {
        fn replace_process(&self, program: &Path, argv: &[OsString]) -> std::io::Result<()> {
            self.calls
                .borrow_mut()
                .push((program.to_path_buf(), argv.to_vec()));
            Ok(())
        }
    }

    fn settings(dir: &TempDir) -> Settings {
        let base = std::fs::canonicalize(dir.path()).unwrap();
        let binary = base.join("rsync");
        std::fs::write(&binary, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(
            &binary,
            std::os::unix::fs::PermissionsExt::from_mode(0o755),
        )
        .unwrap();

        let mut settings = Settings::from_config(Config::default(), Some(base.clone())).unwrap();
        settings.transfer_binary = binary;
        settings.log_path = base.join("audit.log");
        settings
    }

    #[test]
    fn test_rejection_is_audited_without_fetch() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let source = FixedSource {
            projects: Some(ProjectMap::from([("p1", "/srv/p1")])),
            calls: Cell::new(0),
        };
        let exec = RecordingExec::default();
        let gateway = Gateway::new(
            &settings,
            &source,
            AuditLog::new(&settings.log_path),
            &exec,
        );

        let outcome = gateway.run(Some(OsStr::new("ls -la")));

        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(source.calls.get(), 0);
        assert!(exec.calls.borrow().is_empty());
        let log = std::fs::read_to_string(&settings.log_path).unwrap();
        assert!(log.contains("decision:      REJECTED"));
    }

    #[test]
    fn test_rejection_not_audited_when_disabled() {
        let dir = tempdir().unwrap();
        let mut settings = settings(&dir);
        settings.record_rejections = false;
        let source = FixedSource {
            projects: None,
            calls: Cell::new(0),
        };
        let exec = RecordingExec::default();
        let gateway = Gateway::new(
            &settings,
            &source,
            AuditLog::new(&settings.log_path),
            &exec,
        );

        assert_eq!(gateway.run(None), Outcome::Rejected);
        assert!(!settings.log_path.exists());
    }

    #[test]
    fn test_unresolvable_target_skips_fetch() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let home = settings.home_dir.clone().unwrap();
        std::os::unix::fs::symlink(home.join("nowhere"), home.join("dangling")).unwrap();
        let source = FixedSource {
            projects: Some(ProjectMap::from([("p1", "/srv/p1")])),
            calls: Cell::new(0),
        };
        let exec = RecordingExec::default();
        let gateway = Gateway::new(
            &settings,
            &source,
            AuditLog::new(&settings.log_path),
            &exec,
        );

        let outcome = gateway.run(Some(OsStr::new("rsync --server -e . dangling/x")));

        assert_eq!(outcome, Outcome::Denied);
        assert_eq!(source.calls.get(), 0);
        let log = std::fs::read_to_string(&settings.log_path).unwrap();
        assert!(log.contains("DENY (unresolvable target)"));
        assert!(log.contains("policy source: not consulted"));
    }

    #[test]
    fn test_policy_source_line_follows_policy_origin() {
        let dir = tempdir().unwrap();
        let mut settings = settings(&dir);
        let home = settings.home_dir.clone().unwrap();
        let source = FixedSource {
            projects: None,
            calls: Cell::new(0),
        };
        let exec = RecordingExec::default();

        let gateway = Gateway::new(
            &settings,
            &source,
            AuditLog::new(&settings.log_path),
            &exec,
        );
        assert_eq!(
            gateway.run(Some(OsStr::new("rsync --server -e . notes"))),
            Outcome::Denied
        );
        drop(gateway);
        let log = std::fs::read_to_string(&settings.log_path).unwrap();
        assert!(log.contains("policy source: fixed\n"));
        assert!(log.contains("DENY (policy unavailable)"));

        settings.override_dir = Some(home.clone());
        let gateway = Gateway::new(
            &settings,
            &source,
            AuditLog::new(&settings.log_path),
            &exec,
        );
        assert_eq!(
            gateway.run(Some(OsStr::new("rsync --server -e . notes"))),
            Outcome::HandedOff
        );
        let log = std::fs::read_to_string(&settings.log_path).unwrap();
        assert!(log.contains(&format!("policy source: override {}\n", home.display())));
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_missing_transfer_binary_is_exec_failure() {
        let dir = tempdir().unwrap();
        let mut settings = settings(&dir);
        let home = settings.home_dir.clone().unwrap();
        settings.transfer_binary = home.join("no-such-rsync");
        settings.override_dir = Some(home.clone());
        let source = FixedSource {
            projects: None,
            calls: Cell::new(0),
        };
        let exec = RecordingExec::default();
        let gateway = Gateway::new(
            &settings,
            &source,
            AuditLog::new(&settings.log_path),
            &exec,
        );

        let outcome = gateway.run(Some(OsStr::new("rsync --server -e . notes")));

        assert_eq!(outcome, Outcome::ExecFailed);
        assert!(exec.calls.borrow().is_empty());
        let log = std::fs::read_to_string(&settings.log_path).unwrap();
        assert_eq!(log.matches("decision:").count(), 1);
        assert!(log.contains("not found"));
    }
}
