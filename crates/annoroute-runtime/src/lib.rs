//! Annotation service runtime.
//!
//! This crate assembles the assignment components into one service and
//! drives it in the background:
//! - `AnnotationService` - the caller-facing operations (submit, assign,
//!   complete, register, queue, predict)
//! - `ComplexityAnalyzer` - pluggable complexity estimation with a timeout
//!   and a deterministic heuristic fallback
//! - `Scheduler` - periodic assignment passes, expiry sweeps, and
//!   recalibration, woken early by submissions and availability changes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use annoroute_models::Annotator;
//! use annoroute_persistence::InMemoryStore;
//! use annoroute_runtime::{AnnotationService, Scheduler, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::default();
//!     let service = Arc::new(AnnotationService::in_memory(
//!         Arc::new(InMemoryStore::new()),
//!         config.clone(),
//!     ));
//!
//!     let mut scheduler = Scheduler::new(service.clone(), config.scheduler);
//!     scheduler.start()?;
//!
//!     service.register_annotator(Annotator::builder("a1").capacity(3).skill("qa", 0.9).build())?;
//!     let task = service.submit_task("Who wrote it?", "qa", 2).await?;
//!
//!     // The scheduler assigns the task shortly after submission.
//!     tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//!     println!("{:?}", service.get_task(&task.id)?.status);
//!
//!     scheduler.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod complexity;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod service;

pub use complexity::{
    estimate_or_fallback, ComplexityAnalyzer, ComplexityEstimate, EstimateSource,
    HeuristicAnalyzer,
};
pub use config::{AnalyzerConfig, EventLogConfig, SchedulerConfig, ServiceConfig};
pub use error::{AnalyzerError, Result, SchedulerError, ServiceError};
pub use scheduler::Scheduler;
pub use service::{AnnotationService, ServiceStatus, TaskSubmission};
