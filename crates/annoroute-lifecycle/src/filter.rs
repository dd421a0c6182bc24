//! Task filtering for queries.

use annoroute_models::{AnnotatorId, Task, TaskStatus};

/// Default number of tasks returned by a queue query.
pub const DEFAULT_QUEUE_LIMIT: usize = 10;

/// Filter criteria for querying tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Filter by status.
    pub status: Option<TaskStatus>,
    /// Filter by task type.
    pub task_type: Option<String>,
    /// Filter by assigned annotator.
    pub annotator_id: Option<AnnotatorId>,
    /// Filter by minimum priority.
    pub min_priority: Option<i32>,
}

impl TaskFilter {
    /// Creates a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the status filter.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the task type filter.
    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    /// Sets the annotator filter.
    pub fn with_annotator(mut self, annotator_id: AnnotatorId) -> Self {
        self.annotator_id = Some(annotator_id);
        self
    }

    /// Sets the minimum priority filter.
    pub fn with_min_priority(mut self, priority: i32) -> Self {
        self.min_priority = Some(priority);
        self
    }

    /// Returns true if the task matches this filter.
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }

        if let Some(ref task_type) = self.task_type {
            if task.task_type != *task_type {
                return false;
            }
        }

        if let Some(ref annotator_id) = self.annotator_id {
            if task.assigned_annotator.as_ref() != Some(annotator_id) {
                return false;
            }
        }

        if let Some(min_priority) = self.min_priority {
            if task.priority_level < min_priority {
                return false;
            }
        }

        true
    }
}

/// Parameters of a `get_queue` call.
///
/// Without an annotator the queue is the pending pool. With an annotator it
/// is that annotator's Assigned and InProgress work.
#[derive(Debug, Clone)]
pub struct QueueQuery {
    pub annotator_id: Option<AnnotatorId>,
    pub task_type: Option<String>,
    pub limit: usize,
}

impl Default for QueueQuery {
    fn default() -> Self {
        Self {
            annotator_id: None,
            task_type: None,
            limit: DEFAULT_QUEUE_LIMIT,
        }
    }
}

impl QueueQuery {
    /// Creates a query over the pending pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the queue to one annotator's active work.
    pub fn with_annotator(mut self, annotator_id: AnnotatorId) -> Self {
        self.annotator_id = Some(annotator_id);
        self
    }

    /// Restricts the queue to one task type.
    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    /// Sets the maximum number of tasks returned.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Returns true if the task belongs in this queue.
    pub fn matches(&self, task: &Task) -> bool {
        let in_pool = match self.annotator_id {
            Some(ref annotator_id) => {
                task.is_active() && task.assigned_annotator.as_ref() == Some(annotator_id)
            }
            None => task.status == TaskStatus::Pending,
        };

        in_pool
            && self
                .task_type
                .as_ref()
                .map(|t| task.task_type == *t)
                .unwrap_or(true)
    }
}
