//! In-memory repository implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use annoroute_models::{Annotator, AnnotatorId, PredictionRecord, RecalibrationMark, Task, TaskId};
use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, Result};
use crate::repository::{AnnotatorRepository, PredictionRepository, TaskRepository};

/// Serializable copy of every record in a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub annotators: Vec<Annotator>,
    #[serde(default)]
    pub predictions: Vec<PredictionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recalibration: Option<RecalibrationMark>,
}

/// Thread-safe store implementing all repository traits.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
    annotators: RwLock<HashMap<AnnotatorId, Annotator>>,
    predictions: RwLock<HashMap<TaskId, PredictionRecord>>,
    recalibration: RwLock<Option<RecalibrationMark>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a snapshot, keeping stored versions.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            tasks: RwLock::new(
                snapshot
                    .tasks
                    .into_iter()
                    .map(|t| (t.id.clone(), t))
                    .collect(),
            ),
            annotators: RwLock::new(
                snapshot
                    .annotators
                    .into_iter()
                    .map(|a| (a.id.clone(), a))
                    .collect(),
            ),
            predictions: RwLock::new(
                snapshot
                    .predictions
                    .into_iter()
                    .map(|p| (p.task_id.clone(), p))
                    .collect(),
            ),
            recalibration: RwLock::new(snapshot.recalibration),
        }
    }

    /// Copies every record into a snapshot.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            tasks: self.list_tasks()?,
            annotators: self.list_annotators()?,
            predictions: self.list_predictions()?,
            recalibration: self.recalibration_mark()?,
        })
    }
}

impl TaskRepository for InMemoryStore {
    fn insert_task(&self, mut task: Task) -> Result<Task> {
        let mut tasks = self
            .tasks
            .write()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        if tasks.contains_key(&task.id) {
            return Err(PersistenceError::AlreadyExists {
                kind: "task".to_string(),
                id: task.id.to_string(),
            });
        }
        task.version = 1;
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    fn get_task(&self, id: &TaskId) -> Result<Task> {
        let tasks = self
            .tasks
            .read()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        tasks
            .get(id)
            .cloned()
            .ok_or_else(|| PersistenceError::not_found("task", id))
    }

    fn list_tasks(&self) -> Result<Vec<Task>> {
        let tasks = self
            .tasks
            .read()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        let mut items: Vec<Task> = tasks.values().cloned().collect();
        items.sort_by(|a, b| {
            b.priority_level
                .cmp(&a.priority_level)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(items)
    }

    fn compare_and_set_task(&self, expected_version: u64, mut next: Task) -> Result<Task> {
        let mut tasks = self
            .tasks
            .write()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        let current = tasks
            .get(&next.id)
            .ok_or_else(|| PersistenceError::not_found("task", &next.id))?;
        if current.version != expected_version {
            return Err(PersistenceError::VersionConflict {
                kind: "task".to_string(),
                id: next.id.to_string(),
                expected: expected_version,
                actual: current.version,
            });
        }
        next.version = expected_version + 1;
        tasks.insert(next.id.clone(), next.clone());
        Ok(next)
    }
}

impl AnnotatorRepository for InMemoryStore {
    fn insert_annotator(&self, mut annotator: Annotator) -> Result<Annotator> {
        let mut annotators = self
            .annotators
            .write()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        if annotators.contains_key(&annotator.id) {
            return Err(PersistenceError::AlreadyExists {
                kind: "annotator".to_string(),
                id: annotator.id.to_string(),
            });
        }
        annotator.version = 1;
        annotators.insert(annotator.id.clone(), annotator.clone());
        Ok(annotator)
    }

    fn get_annotator(&self, id: &AnnotatorId) -> Result<Annotator> {
        let annotators = self
            .annotators
            .read()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        annotators
            .get(id)
            .cloned()
            .ok_or_else(|| PersistenceError::not_found("annotator", id))
    }

    fn list_annotators(&self) -> Result<Vec<Annotator>> {
        let annotators = self
            .annotators
            .read()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        let mut items: Vec<Annotator> = annotators.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    fn compare_and_set_annotator(
        &self,
        expected_version: u64,
        mut next: Annotator,
    ) -> Result<Annotator> {
        let mut annotators = self
            .annotators
            .write()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        let current = annotators
            .get(&next.id)
            .ok_or_else(|| PersistenceError::not_found("annotator", &next.id))?;
        if current.version != expected_version {
            return Err(PersistenceError::VersionConflict {
                kind: "annotator".to_string(),
                id: next.id.to_string(),
                expected: expected_version,
                actual: current.version,
            });
        }
        next.version = expected_version + 1;
        annotators.insert(next.id.clone(), next.clone());
        Ok(next)
    }
}

impl PredictionRepository for InMemoryStore {
    fn upsert_prediction(&self, record: PredictionRecord) -> Result<()> {
        let mut predictions = self
            .predictions
            .write()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        predictions.insert(record.task_id.clone(), record);
        Ok(())
    }

    fn get_prediction(&self, task_id: &TaskId) -> Result<Option<PredictionRecord>> {
        let predictions = self
            .predictions
            .read()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        Ok(predictions.get(task_id).cloned())
    }

    fn list_predictions(&self) -> Result<Vec<PredictionRecord>> {
        let predictions = self
            .predictions
            .read()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        let mut items: Vec<PredictionRecord> = predictions.values().cloned().collect();
        items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        Ok(items)
    }

    fn recalibration_mark(&self) -> Result<Option<RecalibrationMark>> {
        let mark = self
            .recalibration
            .read()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        Ok(*mark)
    }

    fn set_recalibration_mark(&self, mark: RecalibrationMark) -> Result<()> {
        let mut current = self
            .recalibration
            .write()
            .map_err(|_| PersistenceError::LockPoisoned)?;
        *current = Some(mark);
        Ok(())
    }
}
