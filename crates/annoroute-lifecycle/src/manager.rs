//! TaskLifecycleManager - the task state machine.
//!
//! Every transition is a read, a state-machine check, and a version
//! compare-and-set. Callers that pass an expected version (the optimizer,
//! the expiry sweep) get a `Conflict` as soon as the task moved underneath
//! them. Externally triggered transitions re-read and re-check on conflict,
//! up to [`LifecycleConfig::max_cas_retries`] times, so a racing transition
//! is never silently overwritten.

use std::sync::Arc;

use annoroute_events::EventBus;
use annoroute_models::{
    AnnotatorId, Event, EventBuilder, EventType, Task, TaskId, TaskStatus, MAX_ESTIMATED_TIME_SECS,
};
use annoroute_persistence::TaskRepository;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{LifecycleConfig, RetryPolicy};
use crate::error::{LifecycleError, Result};
use crate::filter::{QueueQuery, TaskFilter};

/// Reason recorded on tasks failed by the assignment TTL.
pub const EXPIRED_ASSIGNMENT_REASON: &str = "assignment expired";

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    /// Pending tasks that outlived the pending TTL.
    pub expired: Vec<TaskId>,
    /// Overdue assignments marked Failed, with the annotator that held them.
    pub failed: Vec<(TaskId, AnnotatorId)>,
    /// Overdue assignments returned to Pending, with the annotator that held them.
    pub requeued: Vec<(TaskId, AnnotatorId)>,
    /// Tasks skipped because they changed during the sweep.
    pub skipped: usize,
}

impl SweepReport {
    /// Annotators whose workload must be released, one entry per task.
    pub fn released_annotators(&self) -> impl Iterator<Item = &AnnotatorId> {
        self.failed
            .iter()
            .chain(self.requeued.iter())
            .map(|(_, annotator)| annotator)
    }

    /// Total number of tasks that changed state.
    pub fn total(&self) -> usize {
        self.expired.len() + self.failed.len() + self.requeued.len()
    }
}

/// Authoritative store of task state.
pub struct TaskLifecycleManager {
    repo: Arc<dyn TaskRepository>,
    events: Arc<EventBus>,
    config: LifecycleConfig,
}

impl TaskLifecycleManager {
    /// Creates a manager with the default configuration.
    pub fn new(repo: Arc<dyn TaskRepository>, events: Arc<EventBus>) -> Self {
        Self::with_config(repo, events, LifecycleConfig::default())
    }

    /// Creates a manager with an explicit configuration.
    pub fn with_config(
        repo: Arc<dyn TaskRepository>,
        events: Arc<EventBus>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            repo,
            events,
            config,
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Accepts a new task into the pending pool.
    ///
    /// # Errors
    ///
    /// `Validation` for empty content or type, a complexity outside
    /// [0, 1], or a task that is not Pending.
    pub fn submit(&self, task: Task) -> Result<Task> {
        validate_new(&task)?;

        let stored = self.repo.insert_task(task)?;
        info!(
            task_id = %stored.id,
            task_type = %stored.task_type,
            priority = stored.priority_level,
            "Task submitted"
        );

        self.events.emit(
            EventBuilder::new(EventType::TaskSubmitted, "Task submitted")
                .task(stored.id.clone())
                .with_context("priority", stored.priority_level)
                .build(),
        );

        Ok(stored)
    }

    /// Gets a task by id.
    pub fn get(&self, id: &TaskId) -> Result<Task> {
        Ok(self.repo.get_task(id)?)
    }

    /// Lists tasks, highest priority first, then oldest first.
    pub fn list(&self, filter: Option<TaskFilter>) -> Result<Vec<Task>> {
        Ok(self
            .repo
            .list_tasks()?
            .into_iter()
            .filter(|t| filter.as_ref().map(|f| f.matches(t)).unwrap_or(true))
            .collect())
    }

    /// Pending tasks in optimizer input order.
    pub fn pending_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.repo.tasks_by_status(TaskStatus::Pending)?)
    }

    /// Ordered queue view; see [`QueueQuery`].
    pub fn get_queue(&self, query: &QueueQuery) -> Result<Vec<Task>> {
        Ok(self
            .repo
            .list_tasks()?
            .into_iter()
            .filter(|t| query.matches(t))
            .take(query.limit)
            .collect())
    }

    /// Number of Assigned or InProgress tasks held by an annotator.
    pub fn active_workload(&self, annotator_id: &AnnotatorId) -> Result<usize> {
        Ok(self
            .repo
            .list_tasks()?
            .iter()
            .filter(|t| t.is_active() && t.assigned_annotator.as_ref() == Some(annotator_id))
            .count())
    }

    /// Pending → Assigned, only if the task is still at `expected_version`.
    pub fn assign(
        &self,
        id: &TaskId,
        expected_version: u64,
        annotator_id: &AnnotatorId,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let task = self.transition(id, Some(expected_version), TaskStatus::Assigned, |task| {
            if task.assigned_annotator.is_some() {
                return Err(LifecycleError::InvalidTransition {
                    id: task.id.to_string(),
                    from: task.status,
                    to: TaskStatus::Assigned,
                });
            }
            task.assign(annotator_id.clone(), now);
            Ok(())
        })?;

        info!(task_id = %id, annotator_id = %annotator_id, "Task assigned");
        Ok(task)
    }

    /// Assigned → InProgress.
    pub fn start(&self, id: &TaskId, now: DateTime<Utc>) -> Result<Task> {
        let task = self.transition(id, None, TaskStatus::InProgress, |task| {
            task.start(now);
            Ok(())
        })?;

        debug!(task_id = %id, "Task started");
        self.events.emit(
            EventBuilder::new(EventType::TaskStarted, "Task started")
                .task(id.clone())
                .build(),
        );
        Ok(task)
    }

    /// InProgress → Completed.
    ///
    /// Completion events are emitted by the feedback loop, which owns the
    /// quality score.
    pub fn complete(&self, id: &TaskId, now: DateTime<Utc>) -> Result<Task> {
        let task = self.transition(id, None, TaskStatus::Completed, |task| {
            task.complete(now);
            Ok(())
        })?;

        info!(task_id = %id, "Task completed");
        Ok(task)
    }

    /// Assigned or InProgress → Failed.
    ///
    /// The returned task names the released annotator in
    /// `previous_annotator`.
    pub fn fail(&self, id: &TaskId, reason: &str, now: DateTime<Utc>) -> Result<Task> {
        let task = self.transition(id, None, TaskStatus::Failed, |task| {
            task.fail(reason, now);
            Ok(())
        })?;

        warn!(task_id = %id, reason, "Task failed");
        self.events.emit(
            EventBuilder::new(EventType::TaskFailed, "Task failed")
                .task(id.clone())
                .with_context("reason", reason)
                .build(),
        );
        Ok(task)
    }

    /// Pending → Cancelled. The task leaves optimizer input immediately.
    pub fn cancel(&self, id: &TaskId) -> Result<Task> {
        let task = self.transition(id, None, TaskStatus::Cancelled, |task| {
            task.cancel();
            Ok(())
        })?;

        info!(task_id = %id, "Task cancelled");
        self.events.emit(
            EventBuilder::new(EventType::TaskCancelled, "Task cancelled")
                .task(id.clone())
                .build(),
        );
        Ok(task)
    }

    /// Applies TTL rules as of `now`.
    ///
    /// Pending tasks past the pending TTL become Expired. Assigned or
    /// InProgress tasks past `assigned_at + estimated_time * buffer_factor`
    /// are failed or requeued per the retry policy. Each change is a
    /// compare-and-set against the version read at the start of the sweep;
    /// tasks that moved in the meantime are skipped until the next sweep.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let ttl = self.config.pending_ttl();

        for task in self.repo.list_tasks()? {
            if task.is_pending_expired(now, ttl) {
                match self.transition(&task.id, Some(task.version), TaskStatus::Expired, |t| {
                    t.expire();
                    Ok(())
                }) {
                    Ok(_) => {
                        info!(task_id = %task.id, "Pending task expired");
                        self.events.emit(Event::task_expired(&task.id, None));
                        report.expired.push(task.id.clone());
                    }
                    Err(e) => skip_changed(&mut report, &task.id, e)?,
                }
                continue;
            }

            if !task.is_assignment_overdue(now, self.config.buffer_factor) {
                continue;
            }
            let Some(annotator_id) = task.assigned_annotator.clone() else {
                continue;
            };

            let requeue = match self.config.retry_policy {
                RetryPolicy::Fail => false,
                RetryPolicy::Requeue { max_attempts } => task.attempts < max_attempts,
            };

            let outcome = if requeue {
                self.transition(&task.id, Some(task.version), TaskStatus::Pending, |t| {
                    t.requeue();
                    Ok(())
                })
            } else {
                self.transition(&task.id, Some(task.version), TaskStatus::Failed, |t| {
                    t.fail(EXPIRED_ASSIGNMENT_REASON, now);
                    Ok(())
                })
            };

            match outcome {
                Ok(updated) => {
                    warn!(
                        task_id = %task.id,
                        annotator_id = %annotator_id,
                        requeued = requeue,
                        attempts = updated.attempts,
                        "Assignment expired"
                    );
                    let event = EventBuilder::new(EventType::TaskExpired, "Assignment expired")
                        .task(task.id.clone())
                        .annotator(annotator_id.clone())
                        .with_context("requeued", requeue)
                        .build();
                    self.events.emit(event);

                    if requeue {
                        report.requeued.push((task.id.clone(), annotator_id));
                    } else {
                        report.failed.push((task.id.clone(), annotator_id));
                    }
                }
                Err(e) => skip_changed(&mut report, &task.id, e)?,
            }
        }

        if report.total() > 0 {
            info!(
                expired = report.expired.len(),
                failed = report.failed.len(),
                requeued = report.requeued.len(),
                "Expiry sweep applied"
            );
        }
        Ok(report)
    }

    fn transition<F>(
        &self,
        id: &TaskId,
        expected_version: Option<u64>,
        to: TaskStatus,
        mut mutate: F,
    ) -> Result<Task>
    where
        F: FnMut(&mut Task) -> Result<()>,
    {
        let mut attempts = 0;
        loop {
            let current = self.repo.get_task(id)?;

            if let Some(expected) = expected_version {
                if current.version != expected {
                    return Err(LifecycleError::Conflict {
                        id: id.to_string(),
                        expected,
                        actual: current.version,
                    });
                }
            }

            if !current.status.can_transition_to(to) {
                return Err(LifecycleError::InvalidTransition {
                    id: id.to_string(),
                    from: current.status,
                    to,
                });
            }

            let mut next = current.clone();
            mutate(&mut next)?;

            match self.repo.compare_and_set_task(current.version, next) {
                Ok(stored) => return Ok(stored),
                Err(e) if e.is_conflict() && expected_version.is_none() => {
                    attempts += 1;
                    if attempts > self.config.max_cas_retries {
                        return Err(e.into());
                    }
                    debug!(task_id = %id, attempts, "Version conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn skip_changed(report: &mut SweepReport, id: &TaskId, err: LifecycleError) -> Result<()> {
    match err {
        LifecycleError::Conflict { .. } | LifecycleError::InvalidTransition { .. } => {
            debug!(task_id = %id, error = %err, "Task changed during sweep, skipping");
            report.skipped += 1;
            Ok(())
        }
        other => Err(other),
    }
}

fn validate_new(task: &Task) -> Result<()> {
    if task.content.trim().is_empty() {
        return Err(LifecycleError::Validation(
            "content must not be empty".to_string(),
        ));
    }
    if task.task_type.trim().is_empty() {
        return Err(LifecycleError::Validation(
            "task_type must not be empty".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&task.complexity_score) {
        return Err(LifecycleError::Validation(format!(
            "complexity_score must be within [0, 1], got {}",
            task.complexity_score
        )));
    }
    if !(0.0..=1.0).contains(&task.requirements.min_skill) {
        return Err(LifecycleError::Validation(format!(
            "min_skill must be within [0, 1], got {}",
            task.requirements.min_skill
        )));
    }
    if task.estimated_time > MAX_ESTIMATED_TIME_SECS {
        return Err(LifecycleError::Validation(format!(
            "estimated_time must be at most {}s, got {}",
            MAX_ESTIMATED_TIME_SECS, task.estimated_time
        )));
    }
    if task.status != TaskStatus::Pending {
        return Err(LifecycleError::Validation(format!(
            "new tasks must be pending, got {}",
            task.status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use annoroute_persistence::InMemoryStore;
    use chrono::Duration;
    use std::thread;

    fn make_manager() -> TaskLifecycleManager {
        TaskLifecycleManager::new(Arc::new(InMemoryStore::new()), Arc::new(EventBus::new()))
    }

    fn make_manager_with(config: LifecycleConfig) -> TaskLifecycleManager {
        TaskLifecycleManager::with_config(
            Arc::new(InMemoryStore::new()),
            Arc::new(EventBus::new()),
            config,
        )
    }

    fn a1() -> AnnotatorId {
        AnnotatorId::from("A1")
    }

    #[test]
    fn test_submit_and_get() {
        let manager = make_manager();
        let task = manager.submit(Task::new("hello", "qa")).unwrap();

        assert_eq!(task.version, 1);
        assert_eq!(manager.get(&task.id).unwrap().content, "hello");
    }

    #[test]
    fn test_submit_validation() {
        let manager = make_manager();

        assert!(matches!(
            manager.submit(Task::new("  ", "qa")),
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(
            manager.submit(Task::new("x", "")),
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(
            manager.submit(Task::builder("x", "qa").complexity(1.5).build()),
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(
            manager.submit(Task::builder("x", "qa").estimated_time(u64::MAX).build()),
            Err(LifecycleError::Validation(_))
        ));
        assert!(manager.list(None).unwrap().is_empty());
    }

    #[test]
    fn test_get_not_found() {
        let manager = make_manager();
        assert!(matches!(
            manager.get(&TaskId::from("missing")),
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[test]
    fn test_full_lifecycle_bumps_versions() {
        let manager = make_manager();
        let task = manager.submit(Task::new("x", "qa")).unwrap();
        let now = Utc::now();

        let assigned = manager.assign(&task.id, 1, &a1(), now).unwrap();
        assert_eq!(assigned.version, 2);
        assert_eq!(assigned.status, TaskStatus::Assigned);

        let started = manager.start(&task.id, now).unwrap();
        assert_eq!(started.version, 3);

        let completed = manager.complete(&task.id, now).unwrap();
        assert_eq!(completed.version, 4);
        assert!(completed.completed_at.is_some());
        assert!(completed.invariants_hold());
    }

    #[test]
    fn test_assign_stale_version_conflicts() {
        let manager = make_manager();
        let task = manager.submit(Task::new("x", "qa")).unwrap();

        let result = manager.assign(&task.id, 7, &a1(), Utc::now());

        assert!(matches!(result, Err(LifecycleError::Conflict { .. })));
        assert_eq!(manager.get(&task.id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_assign_twice_fails() {
        let manager = make_manager();
        let task = manager.submit(Task::new("x", "qa")).unwrap();
        manager.assign(&task.id, 1, &a1(), Utc::now()).unwrap();

        let result = manager.assign(&task.id, 2, &AnnotatorId::from("A2"), Utc::now());
        assert!(matches!(result, Err(LifecycleError::InvalidTransition { .. })));
    }

    #[test]
    fn test_invalid_transitions() {
        let manager = make_manager();
        let task = manager.submit(Task::new("x", "qa")).unwrap();

        assert!(matches!(
            manager.complete(&task.id, Utc::now()),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            manager.start(&task.id, Utc::now()),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            manager.fail(&task.id, "nope", Utc::now()),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let manager = make_manager();
        let task = manager.submit(Task::new("x", "qa")).unwrap();
        manager.cancel(&task.id).unwrap();

        assert!(manager.assign(&task.id, 2, &a1(), Utc::now()).is_err());
        assert!(manager.cancel(&task.id).is_err());
    }

    #[test]
    fn test_fail_records_previous_annotator() {
        let manager = make_manager();
        let task = manager.submit(Task::new("x", "qa")).unwrap();
        manager.assign(&task.id, 1, &a1(), Utc::now()).unwrap();

        let failed = manager.fail(&task.id, "annotator gave up", Utc::now()).unwrap();

        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed.assigned_annotator.is_none());
        assert_eq!(failed.previous_annotator, Some(a1()));
        assert_eq!(failed.failure_reason.as_deref(), Some("annotator gave up"));
    }

    #[test]
    fn test_cancelled_task_leaves_pending_pool() {
        let manager = make_manager();
        let keep = manager.submit(Task::new("keep", "qa")).unwrap();
        let drop = manager.submit(Task::new("drop", "qa")).unwrap();

        manager.cancel(&drop.id).unwrap();

        let pending = manager.pending_tasks().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, keep.id);
    }

    #[test]
    fn test_get_queue_pending_ordering() {
        let manager = make_manager();
        let base = Utc::now();
        manager
            .submit(Task::builder("low", "qa").priority(1).created_at(base).build())
            .unwrap();
        manager
            .submit(
                Task::builder("high new", "qa")
                    .priority(3)
                    .created_at(base)
                    .build(),
            )
            .unwrap();
        manager
            .submit(
                Task::builder("high old", "qa")
                    .priority(3)
                    .created_at(base - Duration::seconds(5))
                    .build(),
            )
            .unwrap();
        manager
            .submit(Task::builder("other", "translation").priority(9).build())
            .unwrap();

        let queue = manager
            .get_queue(&QueueQuery::new().with_task_type("qa").with_limit(2))
            .unwrap();

        let contents: Vec<&str> = queue.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["high old", "high new"]);
    }

    #[test]
    fn test_get_queue_for_annotator() {
        let manager = make_manager();
        let mine = manager.submit(Task::new("mine", "qa")).unwrap();
        let theirs = manager.submit(Task::new("theirs", "qa")).unwrap();
        manager.submit(Task::new("pending", "qa")).unwrap();

        manager.assign(&mine.id, 1, &a1(), Utc::now()).unwrap();
        manager
            .assign(&theirs.id, 1, &AnnotatorId::from("A2"), Utc::now())
            .unwrap();

        let queue = manager
            .get_queue(&QueueQuery::new().with_annotator(a1()))
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, mine.id);
        assert_eq!(manager.active_workload(&a1()).unwrap(), 1);
    }

    #[test]
    fn test_sweep_expires_old_pending() {
        let manager = make_manager();
        let now = Utc::now();
        let old = manager
            .submit(
                Task::builder("old", "qa")
                    .created_at(now - Duration::hours(25))
                    .build(),
            )
            .unwrap();
        let fresh = manager.submit(Task::new("fresh", "qa")).unwrap();

        let report = manager.sweep_expired(now).unwrap();

        assert_eq!(report.expired, vec![old.id.clone()]);
        assert_eq!(manager.get(&old.id).unwrap().status, TaskStatus::Expired);
        assert!(manager.get(&old.id).unwrap().completed_at.is_none());
        assert_eq!(manager.get(&fresh.id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_sweep_fails_overdue_assignment() {
        let manager = make_manager();
        let task = manager
            .submit(Task::builder("x", "qa").estimated_time(300).build())
            .unwrap();
        let t0 = Utc::now();
        manager.assign(&task.id, 1, &a1(), t0).unwrap();

        let early = manager.sweep_expired(t0 + Duration::seconds(900)).unwrap();
        assert_eq!(early.total(), 0);

        let report = manager.sweep_expired(t0 + Duration::seconds(901)).unwrap();

        assert_eq!(report.failed, vec![(task.id.clone(), a1())]);
        assert_eq!(report.released_annotators().count(), 1);
        let stored = manager.get(&task.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some(EXPIRED_ASSIGNMENT_REASON));
    }

    #[test]
    fn test_sweep_skips_unbounded_deadline() {
        let store = Arc::new(InMemoryStore::new());
        let manager = TaskLifecycleManager::new(store.clone(), Arc::new(EventBus::new()));
        let mut task = Task::new("x", "qa");
        task.estimated_time = u64::MAX;
        let task = store.insert_task(task).unwrap();
        let t0 = Utc::now();
        manager.assign(&task.id, task.version, &a1(), t0).unwrap();

        let report = manager.sweep_expired(t0 + Duration::days(365)).unwrap();

        assert_eq!(report.total(), 0);
        assert_eq!(manager.get(&task.id).unwrap().status, TaskStatus::Assigned);
    }

    #[test]
    fn test_sweep_requeue_policy() {
        let manager = make_manager_with(
            LifecycleConfig::default().with_retry_policy(RetryPolicy::Requeue { max_attempts: 1 }),
        );
        let task = manager
            .submit(Task::builder("x", "qa").estimated_time(10).build())
            .unwrap();
        let t0 = Utc::now();

        manager.assign(&task.id, 1, &a1(), t0).unwrap();
        let first = manager.sweep_expired(t0 + Duration::seconds(31)).unwrap();
        assert_eq!(first.requeued.len(), 1);

        let requeued = manager.get(&task.id).unwrap();
        assert_eq!(requeued.status, TaskStatus::Pending);
        assert_eq!(requeued.attempts, 1);
        assert!(requeued.assigned_annotator.is_none());

        let t1 = t0 + Duration::seconds(60);
        manager.assign(&task.id, requeued.version, &a1(), t1).unwrap();
        let second = manager.sweep_expired(t1 + Duration::seconds(31)).unwrap();
        assert_eq!(second.failed.len(), 1);
        assert_eq!(manager.get(&task.id).unwrap().status, TaskStatus::Failed);
    }

    #[test]
    fn test_concurrent_complete_single_winner() {
        let manager = Arc::new(make_manager());
        let task = manager.submit(Task::new("x", "qa")).unwrap();
        manager.assign(&task.id, 1, &a1(), Utc::now()).unwrap();
        manager.start(&task.id, Utc::now()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&manager);
                let id = task.id.clone();
                thread::spawn(move || m.complete(&id, Utc::now()).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(manager.get(&task.id).unwrap().version, 4);
    }
}
