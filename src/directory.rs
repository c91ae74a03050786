//! Tracked repositories.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A repository whose build health is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRepository {
    /// Full project path on the metadata API, e.g. `redox-os/kernel`.
    pub path: String,
    /// Branch whose pipelines are reported.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Packages built from this repository.
    #[serde(default)]
    pub packages: BTreeSet<String>,
}

fn default_branch() -> String {
    "master".to_string()
}

impl TrackedRepository {
    /// Create a tracked repository without packages.
    pub fn new(path: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            branch: branch.into(),
            packages: BTreeSet::new(),
        }
    }

    /// Add packages built from this repository.
    #[must_use]
    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages.extend(packages.into_iter().map(Into::into));
        self
    }
}

/// The fixed, ordered list of tracked repositories.
///
/// Cloning is cheap and shares the underlying list.
#[derive(Debug, Clone, Default)]
pub struct ProjectDirectory {
    repositories: Arc<[TrackedRepository]>,
}

impl ProjectDirectory {
    /// Build a directory, keeping the given order.
    pub fn new(repositories: Vec<TrackedRepository>) -> Self {
        Self {
            repositories: repositories.into(),
        }
    }

    /// All tracked repositories in configured order.
    pub fn repositories(&self) -> &[TrackedRepository] {
        &self.repositories
    }

    /// Look up a repository by its path.
    pub fn get(&self, path: &str) -> Option<&TrackedRepository> {
        self.repositories.iter().find(|r| r.path == path)
    }

    /// Number of tracked repositories.
    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Total number of package names across all repositories.
    pub fn package_count(&self) -> usize {
        self.repositories.iter().map(|r| r.packages.len()).sum()
    }
}

impl From<Vec<TrackedRepository>> for ProjectDirectory {
    fn from(repositories: Vec<TrackedRepository>) -> Self {
        Self::new(repositories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_packages_dedupes_and_sorts() {
        let repo = TrackedRepository::new("redox-os/relibc", "master")
            .with_packages(["relibc", "libc-tests", "relibc"]);

        let names: Vec<&str> = repo.packages.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["libc-tests", "relibc"]);
    }

    #[test]
    fn test_directory_keeps_order() {
        let directory = ProjectDirectory::new(vec![
            TrackedRepository::new("b/second", "main"),
            TrackedRepository::new("a/first", "main").with_packages(["one", "two"]),
        ]);

        let paths: Vec<&str> = directory
            .repositories()
            .iter()
            .map(|r| r.path.as_str())
            .collect();
        assert_eq!(paths, vec!["b/second", "a/first"]);
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.package_count(), 2);
        assert!(directory.get("a/first").is_some());
        assert!(directory.get("c/missing").is_none());
    }

    #[test]
    fn test_deserialize_defaults() {
        let repo: TrackedRepository = serde_yaml::from_str("path: redox-os/kernel").unwrap();
        assert_eq!(repo.branch, "master");
        assert!(repo.packages.is_empty());
    }

    #[test]
    fn test_empty_directory() {
        let directory = ProjectDirectory::default();
        assert!(directory.is_empty());
        assert_eq!(directory.package_count(), 0);
    }
}
