//! Repository abstractions over task, annotator, and prediction records.
//!
//! Every write goes through a version-stamped compare-and-set: the caller
//! passes the version it read and the store stamps `expected + 1` on the
//! stored copy. A mismatch yields [`PersistenceError::VersionConflict`] and
//! leaves the stored record untouched.
//!
//! [`PersistenceError::VersionConflict`]: crate::PersistenceError::VersionConflict

use annoroute_models::{
    Annotator, AnnotatorId, PredictionRecord, RecalibrationMark, Task, TaskId, TaskStatus,
};

use crate::error::Result;

/// Storage for tasks.
pub trait TaskRepository: Send + Sync {
    /// Stores a new task at version 1. Fails if the id is taken.
    fn insert_task(&self, task: Task) -> Result<Task>;

    /// Fetches a task by id.
    fn get_task(&self, id: &TaskId) -> Result<Task>;

    /// All tasks, highest priority first, then oldest first.
    fn list_tasks(&self) -> Result<Vec<Task>>;

    /// Tasks in the given status, in [`TaskRepository::list_tasks`] order.
    fn tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        Ok(self
            .list_tasks()?
            .into_iter()
            .filter(|t| t.status == status)
            .collect())
    }

    /// Replaces a task if its stored version equals `expected_version`.
    fn compare_and_set_task(&self, expected_version: u64, next: Task) -> Result<Task>;
}

/// Storage for annotators.
pub trait AnnotatorRepository: Send + Sync {
    /// Stores a new annotator at version 1. Fails if the id is taken.
    fn insert_annotator(&self, annotator: Annotator) -> Result<Annotator>;

    /// Fetches an annotator by id.
    fn get_annotator(&self, id: &AnnotatorId) -> Result<Annotator>;

    /// All annotators ordered by id.
    fn list_annotators(&self) -> Result<Vec<Annotator>>;

    /// Replaces an annotator if its stored version equals `expected_version`.
    fn compare_and_set_annotator(&self, expected_version: u64, next: Annotator)
        -> Result<Annotator>;
}

/// Storage for prediction records, keyed by task.
pub trait PredictionRepository: Send + Sync {
    /// Inserts or replaces the record for its task.
    fn upsert_prediction(&self, record: PredictionRecord) -> Result<()>;

    /// The record for a task, if one was made.
    fn get_prediction(&self, task_id: &TaskId) -> Result<Option<PredictionRecord>>;

    /// All records, oldest first.
    fn list_predictions(&self) -> Result<Vec<PredictionRecord>>;

    /// Records with a known actual quality, oldest first.
    fn labelled_predictions(&self) -> Result<Vec<PredictionRecord>> {
        Ok(self
            .list_predictions()?
            .into_iter()
            .filter(|r| r.is_labelled())
            .collect())
    }

    /// The last recalibration attempt, if any was recorded.
    fn recalibration_mark(&self) -> Result<Option<RecalibrationMark>>;

    /// Records a recalibration attempt, replacing the previous mark.
    fn set_recalibration_mark(&self, mark: RecalibrationMark) -> Result<()>;
}
