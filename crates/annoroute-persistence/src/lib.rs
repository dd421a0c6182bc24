//! Persistence layer for annotation task routing.
//!
//! The core only depends on the repository traits and their version-stamped
//! compare-and-set semantics. [`InMemoryStore`] implements all of them;
//! [`SnapshotStore`] saves and restores it as a single JSON document using
//! atomic file operations (write to temp file, then rename).
//!
//! # Example
//!
//! ```no_run
//! use annoroute_persistence::{SnapshotStore, TaskRepository};
//! use annoroute_models::Task;
//!
//! let snapshots = SnapshotStore::new("/home/user/.annoroute");
//! let store = snapshots.load().unwrap();
//!
//! let task = store.insert_task(Task::new("Translate this", "translation")).unwrap();
//! snapshots.save(&store).unwrap();
//! ```

pub mod atomic;
pub mod error;
pub mod memory;
pub mod repository;
pub mod snapshot;

pub use error::{PersistenceError, Result};
pub use memory::{InMemoryStore, Snapshot};
pub use repository::{AnnotatorRepository, PredictionRepository, TaskRepository};
pub use snapshot::{SnapshotStore, SNAPSHOT_FILE};
