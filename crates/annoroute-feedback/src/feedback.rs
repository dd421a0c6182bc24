//! PerformanceFeedbackLoop - closes the loop on completed tasks.

use std::sync::Arc;

use annoroute_events::EventBus;
use annoroute_lifecycle::{LifecycleError, TaskLifecycleManager};
use annoroute_models::{
    Annotator, Event, EventBuilder, EventType, RecalibrationMark, Task, TaskId, TaskStatus,
};
use annoroute_persistence::PredictionRepository;
use annoroute_predict::{PredictError, QualityPredictor, RecalibrationSummary};
use annoroute_registry::AnnotatorRegistry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::FeedbackConfig;
use crate::error::{FeedbackError, Result};

/// What a completion changed.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub task: Task,
    pub annotator: Annotator,
    pub quality_score: f64,
    /// True once enough new labelled records have accumulated.
    pub recalibration_due: bool,
}

/// Records realized quality and drives predictor recalibration.
pub struct PerformanceFeedbackLoop {
    registry: Arc<AnnotatorRegistry>,
    lifecycle: Arc<TaskLifecycleManager>,
    predictor: Arc<QualityPredictor>,
    predictions: Arc<dyn PredictionRepository>,
    events: Arc<EventBus>,
    config: FeedbackConfig,
}

impl PerformanceFeedbackLoop {
    pub fn new(
        registry: Arc<AnnotatorRegistry>,
        lifecycle: Arc<TaskLifecycleManager>,
        predictor: Arc<QualityPredictor>,
        predictions: Arc<dyn PredictionRepository>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            lifecycle,
            predictor,
            predictions,
            events,
            config: FeedbackConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: FeedbackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    /// Completes a task with a realized quality score.
    ///
    /// An Assigned task is started first. Only the caller whose transition
    /// to Completed wins records history; any later call gets
    /// `AlreadyCompleted` and changes nothing.
    ///
    /// # Errors
    ///
    /// `Validation` for a score outside [0, 1], `NotActive` for a task no
    /// annotator holds, `AlreadyCompleted` for a repeat completion.
    pub fn complete(
        &self,
        task_id: &TaskId,
        quality_score: f64,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        if !(0.0..=1.0).contains(&quality_score) {
            return Err(FeedbackError::Validation(format!(
                "quality_score must be in [0, 1], got {}",
                quality_score
            )));
        }

        let task = self.lifecycle.get(task_id)?;
        if task.status == TaskStatus::Completed {
            return Err(FeedbackError::AlreadyCompleted(task_id.to_string()));
        }
        let annotator_id = match (&task.assigned_annotator, task.status.is_active()) {
            (Some(annotator_id), true) => annotator_id.clone(),
            _ => {
                return Err(FeedbackError::NotActive {
                    task_id: task_id.to_string(),
                    status: task.status,
                })
            }
        };

        if task.status == TaskStatus::Assigned {
            match self.lifecycle.start(task_id, now) {
                Ok(_) => {}
                // Someone else started it; completion below decides the winner.
                Err(LifecycleError::InvalidTransition {
                    from: TaskStatus::InProgress,
                    ..
                }) => {}
                Err(e) => return Err(self.completion_error(task_id, e)),
            }
        }

        let completed = self
            .lifecycle
            .complete(task_id, now)
            .map_err(|e| self.completion_error(task_id, e))?;

        let annotator = self
            .registry
            .record_completion(&annotator_id, quality_score, now)?;
        self.predictor
            .observe(&annotator_id, &completed.task_type, quality_score)?;
        self.label_prediction(task_id, quality_score, now)?;

        info!(
            task_id = %task_id,
            annotator_id = %annotator_id,
            quality_score,
            "Task completed"
        );
        self.events
            .emit(Event::task_completed(task_id, &annotator_id, quality_score));

        Ok(CompletionOutcome {
            task: completed,
            annotator,
            quality_score,
            recalibration_due: self.recalibration_due()?,
        })
    }

    fn completion_error(&self, task_id: &TaskId, err: LifecycleError) -> FeedbackError {
        match err {
            LifecycleError::InvalidTransition {
                from: TaskStatus::Completed,
                ..
            } => FeedbackError::AlreadyCompleted(task_id.to_string()),
            LifecycleError::InvalidTransition { from, .. } => FeedbackError::NotActive {
                task_id: task_id.to_string(),
                status: from,
            },
            other => other.into(),
        }
    }

    fn label_prediction(&self, task_id: &TaskId, quality: f64, now: DateTime<Utc>) -> Result<()> {
        match self.predictions.get_prediction(task_id)? {
            Some(mut record) => {
                record.actual_quality = Some(quality);
                record.labelled_at = Some(now);
                self.predictions.upsert_prediction(record)?;
            }
            None => warn!(task_id = %task_id, "No prediction record to label"),
        }
        Ok(())
    }

    /// Labelled records since the last recalibration attempt.
    ///
    /// Derived from the stored records and the stored
    /// [`RecalibrationMark`], so it carries over a restart.
    pub fn records_since_recalibration(&self) -> Result<u64> {
        let labelled = self.predictions.labelled_predictions()?.len();
        let seen = self
            .predictions
            .recalibration_mark()?
            .map(|mark| mark.labelled_records)
            .unwrap_or(0);
        Ok(labelled.saturating_sub(seen) as u64)
    }

    /// True once `recalibration_batch` new records have arrived.
    pub fn recalibration_due(&self) -> Result<bool> {
        Ok(self.records_since_recalibration()? >= self.config.recalibration_batch)
    }

    /// Retrains the predictor on every labelled record.
    ///
    /// The due counter resets on every attempt. Too little data is not an
    /// error: the previous models keep serving and `None` is returned.
    pub fn recalibrate(&self) -> Result<Option<RecalibrationSummary>> {
        let records = self.predictions.labelled_predictions()?;
        self.predictions.set_recalibration_mark(RecalibrationMark {
            labelled_records: records.len(),
            attempted_at: Utc::now(),
        })?;
        self.predictor.rebuild_pair_stats(&records)?;

        match self.predictor.recalibrate(&records) {
            Ok(summary) => {
                self.events.emit(
                    EventBuilder::new(EventType::ModelRecalibrated, "Quality model recalibrated")
                        .with_context("generation", summary.generation)
                        .with_context("samples", summary.samples)
                        .with_context("training_error", summary.training_error)
                        .build(),
                );
                Ok(Some(summary))
            }
            Err(PredictError::InsufficientData { have, need }) => {
                info!(have, need, "Not enough labelled records to recalibrate");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Recalibration failed, keeping previous model");
                Err(e.into())
            }
        }
    }

    /// Recalibrates only when due.
    pub fn recalibrate_if_due(&self) -> Result<Option<RecalibrationSummary>> {
        let pending = self.records_since_recalibration()?;
        if pending < self.config.recalibration_batch {
            debug!(
                pending,
                batch = self.config.recalibration_batch,
                "Recalibration not due"
            );
            return Ok(None);
        }
        self.recalibrate()
    }

    /// Rebuilds predictor state from stored records, e.g. after a restart.
    ///
    /// Pair statistics are always restored; models are retrained when enough
    /// labelled records exist. The recalibration mark is left alone, so
    /// records that arrived before the restart still count toward the next
    /// due recalibration.
    pub fn restore(&self) -> Result<Option<RecalibrationSummary>> {
        let records = self.predictions.labelled_predictions()?;
        self.predictor.rebuild_pair_stats(&records)?;
        match self.predictor.recalibrate(&records) {
            Ok(summary) => Ok(Some(summary)),
            Err(PredictError::InsufficientData { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annoroute_events::EventFilter;
    use annoroute_models::{AnnotatorId, FeatureVector, PredictionRecord};
    use annoroute_persistence::InMemoryStore;
    use annoroute_predict::PredictorConfig;
    use annoroute_registry::RegistryConfig;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    struct Fixture {
        store: Arc<InMemoryStore>,
        events: Arc<EventBus>,
        registry: Arc<AnnotatorRegistry>,
        lifecycle: Arc<TaskLifecycleManager>,
        feedback: PerformanceFeedbackLoop,
    }

    fn fixture(batch: u64, min_samples: usize) -> Fixture {
        fixture_with(batch, min_samples, RegistryConfig::default(), 10)
    }

    fn fixture_with(
        batch: u64,
        min_samples: usize,
        registry_config: RegistryConfig,
        capacity: u32,
    ) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(EventBus::new());
        let registry = Arc::new(AnnotatorRegistry::with_config(
            store.clone(),
            events.clone(),
            registry_config,
        ));
        let lifecycle = Arc::new(TaskLifecycleManager::new(store.clone(), events.clone()));
        let predictor = Arc::new(QualityPredictor::new(
            PredictorConfig::default().with_min_training_samples(min_samples),
        ));
        let feedback = PerformanceFeedbackLoop::new(
            registry.clone(),
            lifecycle.clone(),
            predictor,
            store.clone(),
            events.clone(),
        )
        .with_config(FeedbackConfig::default().with_recalibration_batch(batch));

        registry
            .register(
                Annotator::builder("A1")
                    .capacity(capacity)
                    .skill("translation", 0.8)
                    .build(),
            )
            .unwrap();

        Fixture {
            store,
            events,
            registry,
            lifecycle,
            feedback,
        }
    }

    fn assigned_task(f: &Fixture, id: &str) -> TaskId {
        let task = f
            .lifecycle
            .submit(Task::builder("text", "translation").id(id).build())
            .unwrap();
        let a1 = AnnotatorId::from("A1");
        f.registry.reserve(&a1).unwrap();
        f.lifecycle
            .assign(&task.id, task.version, &a1, Utc::now())
            .unwrap();
        f.store
            .upsert_prediction(PredictionRecord {
                task_id: task.id.clone(),
                annotator_id: a1,
                task_type: "translation".to_string(),
                features: FeatureVector {
                    task_complexity: 0.5,
                    annotator_skill: 0.8,
                    rolling_quality: 0.5,
                    current_workload: 0.0,
                    cultural_match: 1.0,
                },
                predicted_quality: 0.5,
                anomaly_score: 0.0,
                actual_quality: None,
                created_at: Utc::now(),
                labelled_at: None,
            })
            .unwrap();
        task.id
    }

    #[test]
    fn test_complete_assigned_task() {
        let f = fixture(100, 50);
        let id = assigned_task(&f, "T1");

        let outcome = f.feedback.complete(&id, 0.9, Utc::now()).unwrap();

        assert_eq!(outcome.task.status, TaskStatus::Completed);
        assert!(outcome.task.started_at.is_some());
        assert_eq!(outcome.annotator.performance_history, vec![0.9]);
        assert_eq!(outcome.annotator.current_workload, 0);
        assert!(!outcome.recalibration_due);

        let record = f.store.get_prediction(&id).unwrap().unwrap();
        assert_eq!(record.actual_quality, Some(0.9));
        assert!(record.labelled_at.is_some());

        let completed = f
            .events
            .list(Some(EventFilter::new().with_event_type(EventType::TaskCompleted)))
            .unwrap();
        assert_eq!(completed.len(), 1);
    }

    #[test]
    fn test_second_completion_changes_nothing() {
        let f = fixture(100, 50);
        let id = assigned_task(&f, "T1");
        f.feedback.complete(&id, 0.9, Utc::now()).unwrap();

        let again = f.feedback.complete(&id, 0.4, Utc::now());

        assert!(matches!(again, Err(FeedbackError::AlreadyCompleted(_))));
        let a1 = f.registry.get(&AnnotatorId::from("A1")).unwrap();
        assert_eq!(a1.performance_history, vec![0.9]);
        assert_eq!(f.feedback.records_since_recalibration().unwrap(), 1);
    }

    #[test]
    fn test_rejects_out_of_range_quality() {
        let f = fixture(100, 50);
        let id = assigned_task(&f, "T1");

        assert!(matches!(
            f.feedback.complete(&id, 1.5, Utc::now()),
            Err(FeedbackError::Validation(_))
        ));
        assert!(matches!(
            f.feedback.complete(&id, f64::NAN, Utc::now()),
            Err(FeedbackError::Validation(_))
        ));
        assert_eq!(f.lifecycle.get(&id).unwrap().status, TaskStatus::Assigned);
    }

    #[test]
    fn test_pending_task_cannot_complete() {
        let f = fixture(100, 50);
        let task = f
            .lifecycle
            .submit(Task::new("text", "translation"))
            .unwrap();

        let result = f.feedback.complete(&task.id, 0.5, Utc::now());

        assert!(matches!(
            result,
            Err(FeedbackError::NotActive {
                status: TaskStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn test_recalibration_becomes_due_and_resets() {
        let f = fixture(2, 50);
        let t1 = assigned_task(&f, "T1");
        let t2 = assigned_task(&f, "T2");

        assert!(!f.feedback.complete(&t1, 0.7, Utc::now()).unwrap().recalibration_due);
        assert!(f.feedback.complete(&t2, 0.8, Utc::now()).unwrap().recalibration_due);
        assert!(f.feedback.recalibration_due().unwrap());

        // Two records are far below the training minimum.
        assert!(f.feedback.recalibrate().unwrap().is_none());
        assert!(!f.feedback.recalibration_due().unwrap());
    }

    #[test]
    fn test_recalibrate_with_enough_records() {
        let f = fixture(100, 4);
        for (i, quality) in [0.6, 0.7, 0.8, 0.9, 0.75].iter().enumerate() {
            let id = assigned_task(&f, &format!("T{}", i));
            f.feedback.complete(&id, *quality, Utc::now()).unwrap();
        }

        let summary = f.feedback.recalibrate().unwrap().unwrap();

        assert_eq!(summary.samples, 5);
        assert_eq!(summary.generation, 1);
        let recalibrated = f
            .events
            .list(Some(EventFilter::new().with_event_type(EventType::ModelRecalibrated)))
            .unwrap();
        assert_eq!(recalibrated.len(), 1);
    }

    #[test]
    fn test_recalibrate_if_due_waits_for_batch() {
        let f = fixture(3, 1);
        let id = assigned_task(&f, "T1");
        f.feedback.complete(&id, 0.7, Utc::now()).unwrap();

        assert!(f.feedback.recalibrate_if_due().unwrap().is_none());
        assert_eq!(f.feedback.records_since_recalibration().unwrap(), 1);
    }

    #[test]
    fn test_completions_land_under_annotator_contention() {
        let f = fixture_with(1000, 50, RegistryConfig::default().with_max_cas_retries(0), 200);
        let ids: Vec<TaskId> = (0..200)
            .map(|i| assigned_task(&f, &format!("T{}", i)))
            .collect();

        let stop = Arc::new(AtomicBool::new(false));
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&f.registry);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    let mut updates = BTreeMap::new();
                    updates.insert(format!("extra-{}", i), 0.5);
                    while !stop.load(Ordering::SeqCst) {
                        let _ = registry.update_skills(&AnnotatorId::from("A1"), &updates);
                    }
                })
            })
            .collect();

        for id in &ids {
            f.feedback.complete(id, 0.8, Utc::now()).unwrap();
        }

        stop.store(true, Ordering::SeqCst);
        for writer in writers {
            writer.join().unwrap();
        }

        let a1 = f.registry.get(&AnnotatorId::from("A1")).unwrap();
        assert_eq!(a1.performance_history.len(), 200);
        assert_eq!(a1.current_workload, 0);
        assert_eq!(f.lifecycle.active_workload(&a1.id).unwrap(), 0);
    }

    #[test]
    fn test_due_count_carries_over_restart() {
        let f = fixture(2, 50);
        for i in 0..3 {
            let id = assigned_task(&f, &format!("T{}", i));
            f.feedback.complete(&id, 0.7, Utc::now()).unwrap();
        }

        let restarted = PerformanceFeedbackLoop::new(
            f.registry.clone(),
            f.lifecycle.clone(),
            Arc::new(QualityPredictor::new(PredictorConfig::default())),
            f.store.clone(),
            f.events.clone(),
        )
        .with_config(FeedbackConfig::default().with_recalibration_batch(2));
        restarted.restore().unwrap();
        assert_eq!(restarted.records_since_recalibration().unwrap(), 3);
        assert!(restarted.recalibration_due().unwrap());

        // Too few records to train, but the attempt is still recorded.
        assert!(restarted.recalibrate_if_due().unwrap().is_none());
        assert_eq!(f.feedback.records_since_recalibration().unwrap(), 0);
        assert!(f.store.recalibration_mark().unwrap().is_some());
    }
}
