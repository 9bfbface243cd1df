//! Where the set of allowed roots comes from.
//!
//! Either a static override directory (no I/O at all) or one live query of
//! the control plane. The two are never mixed.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::control::{ControlPlaneClient, FetchError, ProjectMap};

/// Project name recorded for the static override root.
pub const OVERRIDE_NAME: &str = "override";

/// Supplier of the live project map.
pub trait ProjectSource {
    /// Fetch the current project map.
    fn fetch_projects(&self) -> Result<ProjectMap, FetchError>;

    /// Human-readable location of the source, for the audit record.
    fn describe(&self) -> String;
}

impl ProjectSource for ControlPlaneClient {
    fn fetch_projects(&self) -> Result<ProjectMap, FetchError> {
        ControlPlaneClient::fetch_projects(self)
    }

    fn describe(&self) -> String {
        format!("control plane at {}", self.socket_path().display())
    }
}

/// How a [`PolicySet`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOrigin {
    /// The static override directory.
    Override,
    /// A live control-plane query.
    ControlPlane,
    /// No policy was consulted (rejected or unresolvable request).
    NotConsulted,
}

/// One permitted destination root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoot {
    /// Project the root was published under.
    pub name: String,
    /// Absolute root directory.
    pub path: PathBuf,
}

/// The roots one decision is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    origin: PolicyOrigin,
    roots: Vec<AllowedRoot>,
}

impl PolicySet {
    /// Exactly `{dir}`.
    pub fn from_override(dir: &Path) -> Self {
        Self {
            origin: PolicyOrigin::Override,
            roots: vec![AllowedRoot {
                name: OVERRIDE_NAME.to_string(),
                path: dir.to_path_buf(),
            }],
        }
    }

    /// Roots published by the control plane, in project name order.
    pub fn from_projects(projects: &ProjectMap) -> Self {
        Self {
            origin: PolicyOrigin::ControlPlane,
            roots: projects
                .iter()
                .map(|(name, path)| AllowedRoot {
                    name: name.to_string(),
                    path: path.to_path_buf(),
                })
                .collect(),
        }
    }

    /// No roots; the control plane was asked but gave no usable answer.
    pub fn unavailable() -> Self {
        Self {
            origin: PolicyOrigin::ControlPlane,
            roots: Vec::new(),
        }
    }

    /// No roots; nothing was consulted.
    pub fn empty() -> Self {
        Self {
            origin: PolicyOrigin::NotConsulted,
            roots: Vec::new(),
        }
    }

    /// How the set was obtained.
    pub fn origin(&self) -> PolicyOrigin {
        self.origin
    }

    /// The roots, in evaluation order.
    pub fn roots(&self) -> &[AllowedRoot] {
        &self.roots
    }

    /// `(name, path)` pairs for the audit record.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.roots
            .iter()
            .map(|root| (root.name.clone(), root.path.display().to_string()))
            .collect()
    }
}

/// Resolves the allowed roots for one decision.
pub struct PolicySource<S> {
    source: S,
}

impl<S: ProjectSource> PolicySource<S> {
    /// Policy source backed by `source`.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Description of the live source.
    pub fn describe(&self) -> String {
        self.source.describe()
    }

    /// The override, if any, else one live query. Never retried.
    pub fn resolve_allowed_roots(&self, override_dir: Option<&Path>) -> Result<PolicySet, FetchError> {
        if let Some(dir) = override_dir {
            debug!("Using static override root {:?}", dir);
            return Ok(PolicySet::from_override(dir));
        }

        let projects = self.source.fetch_projects()?;
        Ok(PolicySet::from_projects(&projects))
    }
}
