//! Core data models for annotation task routing.
//!
//! This crate provides the fundamental data types shared by every
//! component: tasks and their state machine, annotator profiles,
//! assignment results, prediction records, and domain events.

pub mod annotator;
pub mod assignment;
pub mod builders;
pub mod event;
pub mod ids;
pub mod prediction;
pub mod task;

// Re-export main types
pub use annotator::{Annotator, AvailabilityStatus, ROLLING_WINDOW};
pub use assignment::{Assignment, AssignmentReport, MatchStrategy, UnmatchedReason, UnmatchedTask};
pub use builders::{AnnotatorBuilder, EventBuilder, TaskBuilder};
pub use event::{Event, EventType};
pub use ids::{AnnotatorId, EventId, TaskId};
pub use prediction::{FeatureVector, PredictionRecord, RecalibrationMark, FEATURE_COUNT};
pub use task::{
    Task, TaskRequirements, TaskStatus, DEFAULT_ESTIMATED_TIME_SECS, MAX_ESTIMATED_TIME_SECS,
};
