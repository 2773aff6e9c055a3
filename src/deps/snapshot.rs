//! Dependency snapshot: capture, persist, evaluate
//!
//! The snapshot is a versioned, pointer-sorted list of `{pointer, hash,
//! dependencies}` entries persisted as newline-terminated JSON. Evaluation
//! against a previous snapshot yields the changed set (hash differences
//! propagated through dependency edges) and the removed set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::DependencyCacheError;
use crate::resolver::ResolvedPlan;

use super::hash::{snapshot_hash, sorted_references};

/// Current on-disk format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One tracked token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub pointer: String,

    /// Content hash from [`snapshot_hash`].
    pub hash: String,

    /// Sorted reference strings (`#/...` internal, `<uri>#/...` external).
    pub dependencies: Vec<String>,
}

/// A captured dependency snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySnapshot {
    pub version: u32,

    /// Entries sorted by pointer.
    pub entries: Vec<DependencyEntry>,
}

/// Result of evaluating a current snapshot against the committed one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyDelta {
    pub changed: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl DependencyDelta {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    fn everything_changed(current: &DependencySnapshot) -> Self {
        Self {
            changed: current
                .entries
                .iter()
                .map(|entry| entry.pointer.clone())
                .collect(),
            removed: BTreeSet::new(),
        }
    }
}

impl DependencySnapshot {
    /// Capture the dependency state of a resolved plan.
    pub fn capture(plan: &ResolvedPlan) -> Self {
        // Context comes from the source each snapshot was parsed from.
        let contexts: BTreeMap<&str, &serde_json::Value> = plan
            .sources
            .iter()
            .filter_map(|source| {
                source
                    .entry
                    .context
                    .as_ref()
                    .map(|context| (source.entry.id.as_str(), context))
            })
            .collect();

        let entries = plan
            .tokens
            .iter()
            .map(|snapshot| {
                let context = contexts
                    .get(snapshot.provenance.source_id.as_str())
                    .copied();
                DependencyEntry {
                    pointer: snapshot.id.clone(),
                    hash: snapshot_hash(snapshot, context),
                    dependencies: sorted_references(snapshot),
                }
            })
            .collect();

        Self {
            version: SNAPSHOT_VERSION,
            entries,
        }
    }

    /// Compare `current` against `self` (the previously committed snapshot).
    ///
    /// A pointer is changed when its hash differs or any of its dependencies
    /// is (transitively) changed. Pointers present before but absent now are
    /// removed.
    pub fn evaluate(&self, current: &DependencySnapshot) -> DependencyDelta {
        if self.version != current.version {
            return DependencyDelta::everything_changed(current);
        }

        let previous: BTreeMap<&str, &DependencyEntry> = self
            .entries
            .iter()
            .map(|entry| (entry.pointer.as_str(), entry))
            .collect();
        let current_pointers: BTreeSet<&str> = current
            .entries
            .iter()
            .map(|entry| entry.pointer.as_str())
            .collect();

        let mut changed: BTreeSet<String> = current
            .entries
            .iter()
            .filter(|entry| {
                previous
                    .get(entry.pointer.as_str())
                    .map(|prev| prev.hash != entry.hash)
                    .unwrap_or(true)
            })
            .map(|entry| entry.pointer.clone())
            .collect();

        // Propagate through dependency edges to a fixpoint.
        loop {
            let mut grew = false;
            for entry in &current.entries {
                if changed.contains(&entry.pointer) {
                    continue;
                }
                if entry
                    .dependencies
                    .iter()
                    .any(|dependency| changed.contains(dependency))
                {
                    changed.insert(entry.pointer.clone());
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }

        let removed = self
            .entries
            .iter()
            .filter(|entry| !current_pointers.contains(entry.pointer.as_str()))
            .map(|entry| entry.pointer.clone())
            .collect();

        DependencyDelta { changed, removed }
    }
}

/// Persistence for the dependency snapshot.
pub struct DependencyStore {
    path: PathBuf,
}

impl DependencyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the committed snapshot. Missing file is `None`; a corrupt
    /// payload is a typed cache error.
    pub async fn load(&self) -> Result<Option<DependencySnapshot>, DependencyCacheError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(DependencyCacheError::Io {
                    path: self.path.display().to_string(),
                    source: err,
                })
            }
        };

        let snapshot = serde_json::from_slice(&bytes).map_err(|err| {
            DependencyCacheError::CorruptSnapshot {
                path: self.path.display().to_string(),
                message: err.to_string(),
            }
        })?;
        Ok(Some(snapshot))
    }

    /// Evaluate `current` against the committed snapshot. A missing or
    /// version-mismatched snapshot marks every pointer changed.
    pub async fn evaluate(
        &self,
        current: &DependencySnapshot,
    ) -> Result<DependencyDelta, DependencyCacheError> {
        match self.load().await? {
            Some(previous) => Ok(previous.evaluate(current)),
            None => Ok(DependencyDelta::everything_changed(current)),
        }
    }

    /// Atomically persist the snapshot: `mkdir -p` the parent, write a temp
    /// file, then rename over the target. The payload is pretty JSON with a
    /// trailing newline.
    pub async fn commit(
        &self,
        snapshot: &DependencySnapshot,
    ) -> Result<(), DependencyCacheError> {
        let io_error = |err: std::io::Error| DependencyCacheError::Io {
            path: self.path.display().to_string(),
            source: err,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let mut payload = serde_json::to_string_pretty(snapshot).map_err(|err| {
            DependencyCacheError::CorruptSnapshot {
                path: self.path.display().to_string(),
                message: err.to_string(),
            }
        })?;
        payload.push('\n');

        let temp = self.path.with_extension("tmp");
        tokio::fs::write(&temp, payload.as_bytes())
            .await
            .map_err(io_error)?;
        tokio::fs::rename(&temp, &self.path).await.map_err(io_error)?;

        tracing::debug!(
            path = %self.path.display(),
            entries = snapshot.entries.len(),
            "dependency snapshot committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(pointer: &str, hash: &str, dependencies: &[&str]) -> DependencyEntry {
        DependencyEntry {
            pointer: pointer.to_string(),
            hash: hash.to_string(),
            dependencies: dependencies.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn snapshot_of(entries: Vec<DependencyEntry>) -> DependencySnapshot {
        DependencySnapshot {
            version: SNAPSHOT_VERSION,
            entries,
        }
    }

    #[test]
    fn identical_snapshots_have_empty_delta() {
        let a = snapshot_of(vec![entry("#/x", "h1", &[]), entry("#/y", "h2", &["#/x"])]);
        let delta = a.evaluate(&a.clone());
        assert!(delta.is_empty());
    }

    #[test]
    fn hash_change_marks_the_pointer_changed() {
        let previous = snapshot_of(vec![entry("#/x", "h1", &[])]);
        let current = snapshot_of(vec![entry("#/x", "h2", &[])]);
        let delta = previous.evaluate(&current);
        assert_eq!(delta.changed.iter().collect::<Vec<_>>(), vec!["#/x"]);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn change_propagates_through_dependencies() {
        let previous = snapshot_of(vec![
            entry("#/base", "h1", &[]),
            entry("#/alias", "h2", &["#/base"]),
            entry("#/alias2", "h3", &["#/alias"]),
            entry("#/other", "h4", &[]),
        ]);
        let current = snapshot_of(vec![
            entry("#/base", "CHANGED", &[]),
            entry("#/alias", "h2", &["#/base"]),
            entry("#/alias2", "h3", &["#/alias"]),
            entry("#/other", "h4", &[]),
        ]);

        let delta = previous.evaluate(&current);
        assert!(delta.changed.contains("#/base"));
        assert!(delta.changed.contains("#/alias"));
        assert!(delta.changed.contains("#/alias2"));
        assert!(!delta.changed.contains("#/other"));
    }

    #[test]
    fn removed_pointers_are_reported() {
        let previous = snapshot_of(vec![entry("#/x", "h1", &[]), entry("#/y", "h2", &[])]);
        let current = snapshot_of(vec![entry("#/x", "h1", &[])]);
        let delta = previous.evaluate(&current);
        assert!(delta.changed.is_empty());
        assert_eq!(delta.removed.iter().collect::<Vec<_>>(), vec!["#/y"]);
    }

    #[test]
    fn version_mismatch_marks_everything_changed() {
        let previous = DependencySnapshot {
            version: 0,
            entries: vec![entry("#/x", "h1", &[])],
        };
        let current = snapshot_of(vec![entry("#/x", "h1", &[])]);
        let delta = previous.evaluate(&current);
        assert!(delta.changed.contains("#/x"));
    }

    #[tokio::test]
    async fn missing_store_marks_everything_changed() {
        let dir = TempDir::new().unwrap();
        let store = DependencyStore::new(dir.path().join("cache/deps.json"));
        let current = snapshot_of(vec![entry("#/x", "h1", &[])]);
        let delta = store.evaluate(&current).await.unwrap();
        assert!(delta.changed.contains("#/x"));
    }

    #[tokio::test]
    async fn commit_then_evaluate_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = DependencyStore::new(dir.path().join("cache/deps.json"));
        let current = snapshot_of(vec![entry("#/x", "h1", &[])]);

        store.commit(&current).await.unwrap();
        let delta = store.evaluate(&current).await.unwrap();
        assert!(delta.is_empty());

        // Trailing newline and valid JSON on disk.
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.ends_with('\n'));
        let parsed: DependencySnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, current);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_typed_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deps.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = DependencyStore::new(&path);
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, DependencyCacheError::CorruptSnapshot { .. }));
    }
}
