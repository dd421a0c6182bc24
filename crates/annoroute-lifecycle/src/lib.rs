//! Task lifecycle management for annotation task routing.
//!
//! This crate provides the `TaskLifecycleManager`, the authoritative store
//! of task state. It owns:
//! - The task state machine, with every transition applied by version
//!   compare-and-set
//! - TTL sweeps for pending tasks and overdue assignments
//! - Priority-ordered queue queries (priority desc, then oldest first)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use annoroute_events::EventBus;
//! use annoroute_lifecycle::{QueueQuery, TaskLifecycleManager};
//! use annoroute_models::Task;
//! use annoroute_persistence::InMemoryStore;
//!
//! let manager = TaskLifecycleManager::new(Arc::new(InMemoryStore::new()), Arc::new(EventBus::new()));
//! let task = manager.submit(Task::with_priority("Translate this", "translation", 3)).unwrap();
//!
//! let queue = manager.get_queue(&QueueQuery::new()).unwrap();
//! assert_eq!(queue[0].id, task.id);
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod manager;

pub use config::{LifecycleConfig, RetryPolicy};
pub use error::{LifecycleError, Result};
pub use filter::{QueueQuery, TaskFilter};
pub use manager::{SweepReport, TaskLifecycleManager};
