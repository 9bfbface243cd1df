//! Canonicalization of the requested destination.
//!
//! A destination usually does not exist yet (rsync creates it), so
//! `fs::canonicalize` on the whole path is not enough. The resolver walks
//! the path one component at a time: while components exist they are
//! canonicalized, following symlinks; from the first missing component on,
//! the rest is appended lexically. A `..` after that point undoes a missing
//! component; if that leads back to an existing directory, the walk resumes
//! canonicalizing from there.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::trace;

/// Errors resolving a destination.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A relative destination with no home directory to anchor it.
    #[error("relative destination '{token}' but no home directory is known")]
    NoHome {
        /// Destination as supplied.
        token: String,
    },

    /// A path component could not be inspected.
    #[error("cannot resolve {path:?}: {source}")]
    Io {
        /// Path being resolved when the error occurred.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A symlink on the path points nowhere.
    #[error("dangling symlink at {path:?}")]
    DanglingSymlink {
        /// The symlink.
        path: PathBuf,
    },
}

/// Canonical absolute destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget(PathBuf);

impl ResolvedTarget {
    /// The canonical path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for ResolvedTarget {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Resolves destination tokens relative to the invoking user's home.
#[derive(Debug, Clone)]
pub struct PathResolver {
    home: Option<PathBuf>,
}

impl PathResolver {
    /// Resolver anchoring relative tokens at `home`.
    pub fn new(home: Option<PathBuf>) -> Self {
        Self { home }
    }

    /// Resolve a destination token to a canonical absolute path.
    pub fn resolve(&self, token: &str) -> Result<ResolvedTarget, ResolveError> {
        let anchored = self.anchor(token)?;
        trace!("Resolving destination {:?}", anchored);

        let mut resolved = PathBuf::from("/");
        let mut exists = true;

        for component in anchored.components() {
            match component {
                Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
                Component::ParentDir => {
                    // Existing prefixes are already canonical, so popping
                    // is the same as following `..`. Popping a missing
                    // component may land back on disk, where symlinks
                    // must be followed again.
                    resolved.pop();
                    if !exists {
                        exists = resolved.exists();
                    }
                }
                Component::Normal(name) => {
                    let candidate = resolved.join(name);
                    if !exists {
                        resolved = candidate;
                        continue;
                    }
                    match fs::canonicalize(&candidate) {
                        Ok(canonical) => resolved = canonical,
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {
                            if fs::symlink_metadata(&candidate).is_ok() {
                                return Err(ResolveError::DanglingSymlink { path: candidate });
                            }
                            trace!("{:?} does not exist, appending remainder lexically", candidate);
                            exists = false;
                            resolved = candidate;
                        }
                        Err(source) => {
                            return Err(ResolveError::Io {
                                path: candidate,
                                source,
                            });
                        }
                    }
                }
            }
        }

        Ok(ResolvedTarget(resolved))
    }

    /// Absolute form of the token, before canonicalization.
    fn anchor(&self, token: &str) -> Result<PathBuf, ResolveError> {
        let path = Path::new(token);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        match self.home {
            Some(ref home) => Ok(home.join(path)),
            None => Err(ResolveError::NoHome {
                token: token.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn test_existing_path_is_canonicalized() {
        let dir = tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(base.join("p1/sub")).unwrap();

        let resolver = PathResolver::new(None);
        let target = resolver
            .resolve(base.join("p1/./sub/../sub").to_str().unwrap())
            .unwrap();

        assert_eq!(target.as_path(), base.join("p1/sub"));
    }

    #[test]
    fn test_missing_tail_is_appended() {
        let dir = tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir(base.join("p1")).unwrap();

        let resolver = PathResolver::new(None);
        let target = resolver
            .resolve(base.join("p1/new/deeper/../file").to_str().unwrap())
            .unwrap();

        assert_eq!(target.as_path(), base.join("p1/new/file"));
    }

    #[test]
    fn test_dotdot_escape_is_resolved() {
        let dir = tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir(base.join("p1")).unwrap();

        let resolver = PathResolver::new(None);
        let target = resolver
            .resolve(base.join("p1/missing/../../other").to_str().unwrap())
            .unwrap();

        assert_eq!(target.as_path(), base.join("other"));
    }

    #[test]
    fn test_symlink_is_followed() {
        let dir = tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir(base.join("outside")).unwrap();
        fs::create_dir(base.join("p1")).unwrap();
        symlink(base.join("outside"), base.join("p1/link")).unwrap();

        let resolver = PathResolver::new(None);
        let target = resolver
            .resolve(base.join("p1/link/file").to_str().unwrap())
            .unwrap();

        assert_eq!(target.as_path(), base.join("outside/file"));
    }

    #[test]
    fn test_symlink_after_dotdot_out_of_missing_dir_is_followed() {
        let dir = tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir(base.join("outside")).unwrap();
        fs::create_dir(base.join("p1")).unwrap();
        symlink(base.join("outside"), base.join("p1/evil")).unwrap();

        let resolver = PathResolver::new(None);
        let target = resolver
            .resolve(base.join("p1/nope/../evil/x").to_str().unwrap())
            .unwrap();

        assert_eq!(target.as_path(), base.join("outside/x"));
    }

    #[test]
    fn test_dangling_symlink_after_dotdot_rejected() {
        let dir = tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir(base.join("p1")).unwrap();
        symlink(base.join("nowhere"), base.join("p1/dangling")).unwrap();

        let resolver = PathResolver::new(None);
        let result = resolver.resolve(base.join("p1/a/b/../../dangling/x").to_str().unwrap());

        assert!(matches!(result, Err(ResolveError::DanglingSymlink { .. })));
    }

    #[test]
    fn test_dangling_symlink_rejected() {
        let dir = tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        symlink(base.join("nowhere"), base.join("dangling")).unwrap();

        let resolver = PathResolver::new(None);
        let result = resolver.resolve(base.join("dangling/file").to_str().unwrap());

        assert!(matches!(result, Err(ResolveError::DanglingSymlink { .. })));
    }

    #[test]
    fn test_relative_anchored_at_home() {
        let dir = tempdir().unwrap();
        let home = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir(home.join("notes")).unwrap();

        let resolver = PathResolver::new(Some(home.clone()));
        let target = resolver.resolve("notes/today").unwrap();

        assert_eq!(target.as_path(), home.join("notes/today"));
    }

    #[test]
    fn test_tilde_is_not_expanded() {
        let dir = tempdir().unwrap();
        let home = fs::canonicalize(dir.path()).unwrap();

        let resolver = PathResolver::new(Some(home.clone()));
        let target = resolver.resolve("~/notes").unwrap();

        assert_eq!(target.as_path(), home.join("~/notes"));
    }

    #[test]
    fn test_relative_without_home() {
        let resolver = PathResolver::new(None);
        assert!(matches!(
            resolver.resolve("notes"),
            Err(ResolveError::NoHome { .. })
        ));
    }

    #[test]
    fn test_root_cannot_be_escaped() {
        let resolver = PathResolver::new(None);
        let target = resolver.resolve("/../../etc/../etc/passwd").unwrap();
        assert_eq!(
            target.as_path(),
            fs::canonicalize("/etc/passwd").unwrap_or_else(|_| PathBuf::from("/etc/passwd"))
        );
    }
}
