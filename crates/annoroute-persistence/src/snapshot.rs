//! File-backed snapshots of the in-memory store.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::atomic::{atomic_write_json, read_json_optional};
use crate::error::Result;
use crate::memory::{InMemoryStore, Snapshot};

/// Default snapshot file name inside a state directory.
pub const SNAPSHOT_FILE: &str = "state.json";

/// Persists the whole store as one JSON document.
///
/// ```text
/// state_dir/
/// └── state.json
/// ```
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a snapshot store rooted at a state directory.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(SNAPSHOT_FILE),
        }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the store, or an empty one if no snapshot exists yet.
    pub fn load(&self) -> Result<InMemoryStore> {
        match read_json_optional::<Snapshot>(&self.path)? {
            Some(snapshot) => {
                debug!(
                    path = %self.path.display(),
                    tasks = snapshot.tasks.len(),
                    annotators = snapshot.annotators.len(),
                    "Loaded snapshot"
                );
                Ok(InMemoryStore::from_snapshot(snapshot))
            }
            None => Ok(InMemoryStore::new()),
        }
    }

    /// Writes the store atomically.
    pub fn save(&self, store: &InMemoryStore) -> Result<()> {
        let snapshot = store.snapshot()?;
        atomic_write_json(&self.path, &snapshot)?;
        debug!(path = %self.path.display(), "Saved snapshot");
        Ok(())
    }
}
