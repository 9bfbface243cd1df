//! The allow/deny decision.
//!
//! A target is allowed when it lies inside at least one root by path
//! segment: `/home/alice` contains `/home/alice` and `/home/alice/x`, but
//! not `/home/alice-evil`. Comparison is component-wise, so trailing
//! separators on a root do not matter.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::policy::{AllowedRoot, PolicySet};
use crate::control::FetchError;
use crate::telemetry::DenyReason;

/// Outcome of an authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The target lies inside `root`.
    Allow {
        /// First matching root.
        root: AllowedRoot,
    },
    /// No root admits the target.
    Deny {
        /// Why.
        reason: DenyReason,
    },
}

/// A decision together with everything needed to audit it.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Allow or deny.
    pub verdict: Verdict,
    /// The canonical target the verdict is about.
    pub target: PathBuf,
    /// Policy snapshot the verdict was evaluated against.
    pub policy: PolicySet,
    /// Diagnostic note; the failure cause on deny.
    pub note: String,
}

impl Decision {
    /// Whether the transfer may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self.verdict, Verdict::Allow { .. })
    }

    /// Deny for a destination that could not be resolved.
    pub fn unresolvable(target: PathBuf, cause: &dyn std::fmt::Display) -> Self {
        Self {
            verdict: Verdict::Deny {
                reason: DenyReason::UnresolvableTarget,
            },
            target,
            policy: PolicySet::empty(),
            note: format!("target could not be resolved: {cause}"),
        }
    }
}

/// Decide whether `target` may be written under `policy`.
///
/// A fetch failure is an empty policy: deny, with the cause in the note.
pub fn authorize(target: &Path, policy: Result<PolicySet, FetchError>) -> Decision {
    let policy = match policy {
        Ok(policy) => policy,
        Err(e) => {
            debug!("Policy unavailable: {}", e);
            return Decision {
                verdict: Verdict::Deny {
                    reason: DenyReason::PolicyUnavailable,
                },
                target: target.to_path_buf(),
                policy: PolicySet::unavailable(),
                note: format!("policy source unreachable: {e}"),
            };
        }
    };

    let matched = policy
        .roots()
        .iter()
        .find(|root| contains(&canonical_root(&root.path), target))
        .cloned();

    match matched {
        Some(root) => {
            let note = format!("matched root {}: {}", root.name, root.path.display());
            Decision {
                verdict: Verdict::Allow { root },
                target: target.to_path_buf(),
                policy,
                note,
            }
        }
        None => Decision {
            verdict: Verdict::Deny {
                reason: DenyReason::NoMatchingRoot,
            },
            target: target.to_path_buf(),
            policy,
            note: "no allowed root contains the target".to_string(),
        },
    }
}

/// Segment containment: `target == root` or `target` is below `root`.
pub fn contains(root: &Path, target: &Path) -> bool {
    target.starts_with(root)
}

/// The canonical form of a root, or the root as published if it cannot be
/// canonicalized.
fn canonical_root(root: &Path) -> PathBuf {
    match fs::canonicalize(root) {
        Ok(canonical) => canonical,
        Err(e) => {
            trace!("Comparing root {:?} as published: {}", root, e);
            root.to_path_buf()
        }
    }
}
