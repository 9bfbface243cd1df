//! Wire schema of the control plane's `/projects` endpoint.
//!
//! The body is a JSON object mapping project names to absolute directory
//! paths:
//!
//! ```json
//! {"p1": "/srv/projects/p1", "notes": "/home/alice/notes"}
//! ```
//!
//! Anything else is rejected as a whole; a response is never partially
//! accepted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::error::FetchError;

/// Request path for the project map.
pub const PROJECTS_PATH: &str = "/projects";

/// Validated project name → allowed directory map, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectMap {
    projects: BTreeMap<String, PathBuf>,
}

impl ProjectMap {
    /// Parse and validate a `/projects` response body.
    pub fn from_json(body: &[u8]) -> Result<Self, FetchError> {
        let raw: BTreeMap<String, String> = serde_json::from_slice(body).map_err(|e| {
            FetchError::Schema(format!("expected an object of name to path strings: {e}"))
        })?;

        let mut projects = BTreeMap::new();
        for (name, dir) in raw {
            if !Path::new(&dir).is_absolute() {
                return Err(FetchError::Schema(format!(
                    "project '{}' maps to non-absolute path '{}'",
                    name.escape_debug(),
                    dir.escape_debug()
                )));
            }
            projects.insert(name, PathBuf::from(dir));
        }

        Ok(Self { projects })
    }

    /// Iterate `(name, directory)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.projects
            .iter()
            .map(|(name, dir)| (name.as_str(), dir.as_path()))
    }

    /// Number of projects.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Whether the map has no projects.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for ProjectMap {
    fn from(entries: [(&str, &str); N]) -> Self {
        Self {
            projects: entries
                .into_iter()
                .map(|(name, dir)| (name.to_string(), PathBuf::from(dir)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_map() {
        let map = ProjectMap::from_json(br#"{"p2": "/srv/p2", "p1": "/srv/projects/p1"}"#).unwrap();

        let entries: Vec<_> = map.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("p1", Path::new("/srv/projects/p1")),
                ("p2", Path::new("/srv/p2")),
            ]
        );
    }

    #[test]
    fn test_parse_empty_object() {
        let map = ProjectMap::from_json(b"{}").unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_reject_non_object() {
        for body in [&b"[]"[..], b"\"/srv\"", b"null", b"42", b"not json", b""] {
            assert!(
                matches!(ProjectMap::from_json(body), Err(FetchError::Schema(_))),
                "accepted {:?}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_reject_non_string_values() {
        let result = ProjectMap::from_json(br#"{"p1": "/srv/p1", "p2": {"path": "/srv/p2"}}"#);
        assert!(matches!(result, Err(FetchError::Schema(_))));

        let result = ProjectMap::from_json(br#"{"p1": 7}"#);
        assert!(matches!(result, Err(FetchError::Schema(_))));
    }

    #[test]
    fn test_reject_relative_or_empty_path() {
        let result = ProjectMap::from_json(br#"{"p1": "/srv/p1", "p2": "srv/p2"}"#);
        assert!(matches!(result, Err(FetchError::Schema(_))));

        let result = ProjectMap::from_json(br#"{"p1": ""}"#);
        assert!(matches!(result, Err(FetchError::Schema(_))));
    }
}
