//! Builder patterns for tasks, annotators, and events.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::annotator::{Annotator, AvailabilityStatus};
use crate::event::{Event, EventType};
use crate::ids::{AnnotatorId, EventId, TaskId};
use crate::task::Task;

/// Builder for creating Event instances with a fluent API.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event_type: EventType,
    title: String,
    task_id: Option<TaskId>,
    annotator_id: Option<AnnotatorId>,
    context: HashMap<String, serde_json::Value>,
}

impl EventBuilder {
    /// Creates a new EventBuilder with required fields.
    pub fn new(event_type: EventType, title: impl Into<String>) -> Self {
        Self {
            event_type,
            title: title.into(),
            task_id: None,
            annotator_id: None,
            context: HashMap::new(),
        }
    }

    /// Sets the task the event concerns.
    pub fn task(mut self, task_id: impl Into<TaskId>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Sets the annotator the event concerns.
    pub fn annotator(mut self, annotator_id: impl Into<AnnotatorId>) -> Self {
        self.annotator_id = Some(annotator_id.into());
        self
    }

    /// Adds a context value.
    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Builds the Event.
    pub fn build(self) -> Event {
        Event {
            id: EventId::new(),
            event_type: self.event_type,
            title: self.title,
            task_id: self.task_id,
            annotator_id: self.annotator_id,
            context: self.context,
            created_at: Utc::now(),
        }
    }
}

/// Convenience constructors for the notifications the core emits.
impl Event {
    /// Creates a builder for a new event.
    pub fn builder(event_type: EventType, title: impl Into<String>) -> EventBuilder {
        EventBuilder::new(event_type, title)
    }

    /// A task was matched to an annotator.
    pub fn task_assigned(
        task_id: &TaskId,
        annotator_id: &AnnotatorId,
        predicted_quality: f64,
        cost: f64,
    ) -> Self {
        EventBuilder::new(EventType::TaskAssigned, "Task assigned")
            .task(task_id.clone())
            .annotator(annotator_id.clone())
            .with_context("predicted_quality", predicted_quality)
            .with_context("cost", cost)
            .build()
    }

    /// Feedback was recorded for a task.
    pub fn task_completed(task_id: &TaskId, annotator_id: &AnnotatorId, quality: f64) -> Self {
        EventBuilder::new(EventType::TaskCompleted, "Task completed")
            .task(task_id.clone())
            .annotator(annotator_id.clone())
            .with_context("quality_score", quality)
            .build()
    }

    /// A task timed out, either in Pending or in its assignment.
    pub fn task_expired(task_id: &TaskId, annotator_id: Option<&AnnotatorId>) -> Self {
        let mut builder = EventBuilder::new(EventType::TaskExpired, "Task expired").task(task_id.clone());
        if let Some(annotator_id) = annotator_id {
            builder = builder.annotator(annotator_id.clone());
        }
        builder.build()
    }

    /// An annotator's availability changed.
    pub fn availability_changed(
        annotator_id: &AnnotatorId,
        from: AvailabilityStatus,
        to: AvailabilityStatus,
    ) -> Self {
        EventBuilder::new(
            EventType::AnnotatorAvailabilityChanged,
            format!("Availability changed to {}", to),
        )
        .annotator(annotator_id.clone())
        .with_context("from", from.to_string())
        .with_context("to", to.to_string())
        .build()
    }
}

/// Builder for creating Task instances with a fluent API.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    /// Creates a new TaskBuilder with required fields.
    pub fn new(content: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            task: Task::new(content, task_type),
        }
    }

    /// Sets an explicit task id.
    pub fn id(mut self, id: impl Into<TaskId>) -> Self {
        self.task.id = id.into();
        self
    }

    /// Sets the priority level.
    pub fn priority(mut self, priority: i32) -> Self {
        self.task.priority_level = priority;
        self
    }

    /// Sets the complexity score.
    pub fn complexity(mut self, score: f64) -> Self {
        self.task.complexity_score = score;
        self
    }

    /// Sets the estimated time in seconds.
    pub fn estimated_time(mut self, secs: u64) -> Self {
        self.task.estimated_time = secs;
        self
    }

    /// Adds a required language.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.task.requirements.languages.insert(language.into());
        self
    }

    /// Sets the required cultural context.
    pub fn cultural_context(mut self, context: impl Into<String>) -> Self {
        self.task.requirements.cultural_context = Some(context.into());
        self
    }

    /// Sets the minimum skill for the task type.
    pub fn min_skill(mut self, min_skill: f64) -> Self {
        self.task.requirements.min_skill = min_skill;
        self
    }

    /// Sets the creation time.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.task.created_at = created_at;
        self
    }

    /// Builds the Task.
    pub fn build(self) -> Task {
        self.task
    }
}

impl Task {
    /// Creates a builder for a new task.
    pub fn builder(content: impl Into<String>, task_type: impl Into<String>) -> TaskBuilder {
        TaskBuilder::new(content, task_type)
    }
}

/// Builder for creating Annotator instances with a fluent API.
#[derive(Debug, Clone)]
pub struct AnnotatorBuilder {
    annotator: Annotator,
}

impl AnnotatorBuilder {
    /// Creates a new AnnotatorBuilder; capacity defaults to 1.
    pub fn new(id: impl Into<AnnotatorId>) -> Self {
        Self {
            annotator: Annotator::new(id, 1),
        }
    }

    /// Sets the capacity.
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.annotator.capacity = capacity;
        self
    }

    /// Sets a skill score.
    pub fn skill(mut self, category: impl Into<String>, score: f64) -> Self {
        self.annotator.skill_scores.insert(category.into(), score);
        self
    }

    /// Adds a spoken language.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.annotator.languages.insert(language.into());
        self
    }

    /// Sets the cultural background.
    pub fn cultural_background(mut self, background: impl Into<String>) -> Self {
        self.annotator.cultural_background = background.into();
        self
    }

    /// Sets the availability status.
    pub fn availability(mut self, status: AvailabilityStatus) -> Self {
        self.annotator.availability_status = status;
        self
    }

    /// Sets the current workload.
    pub fn workload(mut self, workload: u32) -> Self {
        self.annotator.current_workload = workload;
        self
    }

    /// Seeds the performance history.
    pub fn history(mut self, scores: impl IntoIterator<Item = f64>) -> Self {
        self.annotator.performance_history = scores.into_iter().collect();
        self
    }

    /// Sets when the last quality score was recorded.
    pub fn last_performance_at(mut self, at: DateTime<Utc>) -> Self {
        self.annotator.last_performance_at = Some(at);
        self
    }

    /// Builds the Annotator.
    pub fn build(self) -> Annotator {
        self.annotator
    }
}

impl Annotator {
    /// Creates a builder for a new annotator.
    pub fn builder(id: impl Into<AnnotatorId>) -> AnnotatorBuilder {
        AnnotatorBuilder::new(id)
    }
}
