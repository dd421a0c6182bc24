//! Domain events emitted by the assignment core.
//!
//! Events are fire-and-forget notifications. They double as the audit log
//! for assignments, which are not persisted as mutable state of their own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{AnnotatorId, EventId, TaskId};

/// Types of events emitted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A task entered the pending pool.
    TaskSubmitted,
    /// A task was matched to an annotator.
    TaskAssigned,
    /// An annotator started work on a task.
    TaskStarted,
    /// Feedback with a quality score was recorded.
    TaskCompleted,
    /// A task failed explicitly or by assignment TTL.
    TaskFailed,
    /// A task expired in Pending or had its assignment expire.
    TaskExpired,
    /// A task was returned to Pending after its assignment expired.
    TaskRequeued,
    /// A pending task was withdrawn.
    TaskCancelled,
    /// A new annotator was registered.
    AnnotatorRegistered,
    /// An annotator's availability changed.
    AnnotatorAvailabilityChanged,
    /// A new predictor model was swapped in.
    ModelRecalibrated,
}

impl EventType {
    /// Returns true for the notifications external consumers subscribe to.
    pub fn is_notification(&self) -> bool {
        matches!(
            self,
            EventType::TaskAssigned
                | EventType::TaskCompleted
                | EventType::TaskExpired
                | EventType::AnnotatorAvailabilityChanged
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventType::TaskSubmitted => "task_submitted",
            EventType::TaskAssigned => "task_assigned",
            EventType::TaskStarted => "task_started",
            EventType::TaskCompleted => "task_completed",
            EventType::TaskFailed => "task_failed",
            EventType::TaskExpired => "task_expired",
            EventType::TaskRequeued => "task_requeued",
            EventType::TaskCancelled => "task_cancelled",
            EventType::AnnotatorRegistered => "annotator_registered",
            EventType::AnnotatorAvailabilityChanged => "annotator_availability_changed",
            EventType::ModelRecalibrated => "model_recalibrated",
        };
        write!(f, "{}", s)
    }
}

/// An event in the assignment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for the event.
    pub id: EventId,

    /// Type of the event.
    pub event_type: EventType,

    /// Short human-readable summary.
    pub title: String,

    /// Task the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,

    /// Annotator the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotator_id: Option<AnnotatorId>,

    /// Additional context data.
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,

    /// When the event was created.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Creates a new event with the given type and title.
    pub fn new(event_type: EventType, title: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            title: title.into(),
            task_id: None,
            annotator_id: None,
            context: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns true if the event concerns the given task.
    pub fn concerns_task(&self, task_id: &TaskId) -> bool {
        self.task_id.as_ref() == Some(task_id)
    }

    /// Returns true if the event concerns the given annotator.
    pub fn concerns_annotator(&self, annotator_id: &AnnotatorId) -> bool {
        self.annotator_id.as_ref() == Some(annotator_id)
    }
}
