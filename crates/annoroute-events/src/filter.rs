//! Event filtering for audit queries.

use annoroute_models::{AnnotatorId, Event, EventType, TaskId};
use chrono::{DateTime, Utc};

/// Filter criteria for querying the audit log.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by event type.
    pub event_type: Option<EventType>,
    /// Filter by task.
    pub task_id: Option<TaskId>,
    /// Filter by annotator.
    pub annotator_id: Option<AnnotatorId>,
    /// Only events created at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

impl EventFilter {
    /// Creates a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event type filter.
    pub fn with_event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    /// Sets the task filter.
    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Sets the annotator filter.
    pub fn with_annotator(mut self, annotator_id: AnnotatorId) -> Self {
        self.annotator_id = Some(annotator_id);
        self
    }

    /// Sets the lower time bound.
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Returns true if the event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }

        if let Some(ref task_id) = self.task_id {
            if !event.concerns_task(task_id) {
                return false;
            }
        }

        if let Some(ref annotator_id) = self.annotator_id {
            if !event.concerns_annotator(annotator_id) {
                return false;
            }
        }

        if let Some(since) = self.since {
            if event.created_at < since {
                return false;
            }
        }

        true
    }
}
