//! Annotation task types.
//!
//! Tasks move through a small state machine:
//!
//! ```text
//! Pending ──► Assigned ──► InProgress ──► Completed
//!    │            │             │
//!    │            └──► Failed ◄─┘
//!    ├──► Expired
//!    └──► Cancelled
//! ```
//!
//! Assigned and InProgress tasks may also be returned to Pending when an
//! expired assignment is retried. Completed, Failed, Expired, and Cancelled
//! are terminal.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::{AnnotatorId, TaskId};

/// Default estimated time for a task with no complexity estimate (30 minutes).
pub const DEFAULT_ESTIMATED_TIME_SECS: u64 = 1800;

/// Upper bound on `estimated_time` accepted at intake (30 days).
pub const MAX_ESTIMATED_TIME_SECS: u64 = 30 * 24 * 3600;

/// State of an annotation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for an assignment pass.
    #[default]
    Pending,
    /// Matched to an annotator, work not yet started.
    Assigned,
    /// The annotator is working on the task.
    InProgress,
    /// Feedback was submitted with a quality score.
    Completed,
    /// Explicit failure or assignment TTL breach.
    Failed,
    /// Sat in Pending past the pending TTL.
    Expired,
    /// Withdrawn by its owner while Pending.
    Cancelled,
}

impl TaskStatus {
    /// Returns true if no further transitions are permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Expired | TaskStatus::Cancelled
        )
    }

    /// Returns true if the task counts against its annotator's workload.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::InProgress)
    }

    /// Returns true if a task in this state references an annotator.
    pub fn holds_annotator(&self) -> bool {
        matches!(
            self,
            TaskStatus::Assigned | TaskStatus::InProgress | TaskStatus::Completed
        )
    }

    /// Returns true if `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Pending, Expired)
                | (Pending, Cancelled)
                | (Assigned, InProgress)
                | (Assigned, Failed)
                | (Assigned, Pending)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Pending)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Expired => "expired",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Constraints an annotator must satisfy to be eligible for a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRequirements {
    /// Languages the annotator must speak (all of them).
    #[serde(default)]
    pub languages: BTreeSet<String>,

    /// Cultural context the annotator's background should match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cultural_context: Option<String>,

    /// Minimum skill score for the task type.
    #[serde(default)]
    pub min_skill: f64,
}

/// An annotation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for the task.
    pub id: TaskId,

    /// Content to be annotated.
    pub content: String,

    /// Category tag, matched against annotator skill categories.
    pub task_type: String,

    /// Complexity in [0, 1].
    pub complexity_score: f64,

    /// Higher is more urgent.
    pub priority_level: i32,

    /// Estimated handling time in seconds.
    pub estimated_time: u64,

    /// Current state.
    pub status: TaskStatus,

    /// Eligibility constraints.
    #[serde(default)]
    pub requirements: TaskRequirements,

    /// Annotator holding the task (Assigned, InProgress, Completed only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_annotator: Option<AnnotatorId>,

    /// Annotator that held the task before it failed or was requeued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_annotator: Option<AnnotatorId>,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// When the current assignment was made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,

    /// When the annotator started work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the task completed or failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Why the task failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Number of times the task was returned to Pending after expiry.
    #[serde(default)]
    pub attempts: u32,

    /// Optimistic concurrency counter, stamped by the repository.
    #[serde(default)]
    pub version: u64,
}

impl Task {
    /// Creates a new pending task with default complexity and priority.
    pub fn new(content: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            content: content.into(),
            task_type: task_type.into(),
            complexity_score: 0.5,
            priority_level: 1,
            estimated_time: DEFAULT_ESTIMATED_TIME_SECS,
            status: TaskStatus::Pending,
            requirements: TaskRequirements::default(),
            assigned_annotator: None,
            previous_annotator: None,
            created_at: Utc::now(),
            assigned_at: None,
            started_at: None,
            completed_at: None,
            failure_reason: None,
            attempts: 0,
            version: 0,
        }
    }

    /// Creates a new pending task with the given priority.
    pub fn with_priority(
        content: impl Into<String>,
        task_type: impl Into<String>,
        priority_level: i32,
    ) -> Self {
        let mut task = Self::new(content, task_type);
        task.priority_level = priority_level;
        task
    }

    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if the task counts against its annotator's workload.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Marks the task as assigned to an annotator.
    pub fn assign(&mut self, annotator_id: AnnotatorId, now: DateTime<Utc>) {
        self.status = TaskStatus::Assigned;
        self.assigned_annotator = Some(annotator_id);
        self.assigned_at = Some(now);
    }

    /// Marks the task as started.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::InProgress;
        self.started_at = Some(now);
    }

    /// Marks the task as completed.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
    }

    /// Marks the task as failed, releasing its annotator reference.
    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = TaskStatus::Failed;
        self.completed_at = Some(now);
        self.failure_reason = Some(reason.into());
        if let Some(annotator) = self.assigned_annotator.take() {
            self.previous_annotator = Some(annotator);
        }
    }

    /// Marks a pending task as expired.
    pub fn expire(&mut self) {
        self.status = TaskStatus::Expired;
    }

    /// Marks a pending task as cancelled.
    pub fn cancel(&mut self) {
        self.status = TaskStatus::Cancelled;
    }

    /// Returns an assigned task to the pending pool.
    pub fn requeue(&mut self) {
        self.status = TaskStatus::Pending;
        if let Some(annotator) = self.assigned_annotator.take() {
            self.previous_annotator = Some(annotator);
        }
        self.assigned_at = None;
        self.started_at = None;
        self.attempts += 1;
    }

    /// Returns the instant after which the current assignment is overdue.
    ///
    /// The deadline is `assigned_at + estimated_time * buffer_factor`.
    /// Returns `None` when unassigned, or when the deadline falls outside
    /// the representable range, in which case the assignment never expires.
    pub fn assignment_deadline(&self, buffer_factor: f64) -> Option<DateTime<Utc>> {
        let assigned_at = self.assigned_at?;
        let allowance_ms = (self.estimated_time as f64 * buffer_factor * 1000.0).round() as i64;
        assigned_at.checked_add_signed(Duration::try_milliseconds(allowance_ms)?)
    }

    /// Returns true if an active assignment has outlived its allowance.
    pub fn is_assignment_overdue(&self, now: DateTime<Utc>, buffer_factor: f64) -> bool {
        if !self.is_active() {
            return false;
        }
        self.assignment_deadline(buffer_factor)
            .is_some_and(|deadline| now > deadline)
    }

    /// Returns true if a pending task has waited longer than `ttl`.
    pub fn is_pending_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.status == TaskStatus::Pending && now - self.created_at > ttl
    }

    /// Checks the structural invariants tying fields to status.
    pub fn invariants_hold(&self) -> bool {
        let annotator_ok = self.assigned_annotator.is_some() == self.status.holds_annotator();
        let completed_ok = self.completed_at.is_some()
            == matches!(self.status, TaskStatus::Completed | TaskStatus::Failed);
        annotator_ok && completed_ok
    }
}
