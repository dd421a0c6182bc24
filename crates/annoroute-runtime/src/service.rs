//! AnnotationService - the operations exposed to callers.
//!
//! The service wires the registry, lifecycle manager, predictor, optimizer,
//! and feedback loop over one set of repositories and one event bus. State
//! changes that can create new assignment opportunities (submission,
//! registration, availability changes, completions, expiries) wake the
//! scheduler through [`AnnotationService::triggers`].

use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use annoroute_events::{EventBus, EventFilter};
use annoroute_feedback::{CompletionOutcome, PerformanceFeedbackLoop};
use annoroute_lifecycle::{QueueQuery, SweepReport, TaskFilter, TaskLifecycleManager};
use annoroute_models::{
    Annotator, AnnotatorId, Assignment, AssignmentReport, AvailabilityStatus, Event, Task, TaskId,
    TaskStatus,
};
use annoroute_optimizer::AssignmentOptimizer;
use annoroute_persistence::{
    AnnotatorRepository, InMemoryStore, PredictionRepository, TaskRepository,
};
use annoroute_predict::{Prediction, QualityPredictor, RecalibrationSummary, WorkloadBalancer};
use annoroute_registry::{AnnotatorAnalytics, AnnotatorProfile, AnnotatorRegistry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::complexity::{estimate_or_fallback, ComplexityAnalyzer, EstimateSource, HeuristicAnalyzer};
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};

/// A task as submitted by a caller.
///
/// Complexity and estimated time are optional; missing values come from the
/// complexity analyzer.
#[derive(Debug, Clone, Default)]
pub struct TaskSubmission {
    pub id: Option<TaskId>,
    pub content: String,
    pub task_type: String,
    pub priority: i32,
    pub complexity_score: Option<f64>,
    pub estimated_time_secs: Option<u64>,
    pub languages: Vec<String>,
    pub cultural_context: Option<String>,
    pub min_skill: f64,
}

impl TaskSubmission {
    pub fn new(content: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            task_type: task_type.into(),
            priority: 1,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_complexity(mut self, score: f64) -> Self {
        self.complexity_score = Some(score);
        self
    }

    pub fn with_estimated_time(mut self, secs: u64) -> Self {
        self.estimated_time_secs = Some(secs);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.languages.push(language.into());
        self
    }

    pub fn with_cultural_context(mut self, context: impl Into<String>) -> Self {
        self.cultural_context = Some(context.into());
        self
    }

    pub fn with_min_skill(mut self, min_skill: f64) -> Self {
        self.min_skill = min_skill;
        self
    }
}

/// Point-in-time counters for operators.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    /// Task counts keyed by status name.
    pub tasks: BTreeMap<String, usize>,
    pub annotators: usize,
    pub available_annotators: usize,
    /// Sum of current workload over all annotators.
    pub workload: u32,
    /// Sum of capacity over all annotators.
    pub capacity: u32,
    pub model_trained: bool,
    pub model_generation: u64,
    pub model_samples: usize,
    pub records_since_recalibration: u64,
    pub events_logged: usize,
}

impl ServiceStatus {
    /// Number of tasks in `status`.
    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.get(&status.to_string()).copied().unwrap_or(0)
    }
}

/// Facade over the assignment components.
pub struct AnnotationService {
    config: ServiceConfig,
    events: Arc<EventBus>,
    registry: Arc<AnnotatorRegistry>,
    lifecycle: Arc<TaskLifecycleManager>,
    predictor: Arc<QualityPredictor>,
    balancer: WorkloadBalancer,
    optimizer: AssignmentOptimizer,
    feedback: PerformanceFeedbackLoop,
    analyzer: Arc<dyn ComplexityAnalyzer>,
    triggers: Arc<Notify>,
}

impl AnnotationService {
    /// Builds a service over explicit repositories.
    pub fn with_repositories(
        tasks: Arc<dyn TaskRepository>,
        annotators: Arc<dyn AnnotatorRepository>,
        predictions: Arc<dyn PredictionRepository>,
        config: ServiceConfig,
    ) -> Self {
        let events = Arc::new(EventBus::with_capacity(config.events.capacity));
        let registry = Arc::new(AnnotatorRegistry::with_config(
            annotators,
            events.clone(),
            config.registry.clone(),
        ));
        let lifecycle = Arc::new(TaskLifecycleManager::with_config(
            tasks,
            events.clone(),
            config.lifecycle.clone(),
        ));
        let predictor = Arc::new(QualityPredictor::new(config.predictor.clone()));

        let optimizer = AssignmentOptimizer::new(
            registry.clone(),
            lifecycle.clone(),
            predictor.clone(),
            predictions.clone(),
            events.clone(),
        )
        .with_config(config.optimizer.clone())
        .with_balancer(WorkloadBalancer::new(config.fatigue.clone()));
        let balancer = WorkloadBalancer::new(config.fatigue.clone());

        let feedback = PerformanceFeedbackLoop::new(
            registry.clone(),
            lifecycle.clone(),
            predictor.clone(),
            predictions,
            events.clone(),
        )
        .with_config(config.feedback.clone());

        Self {
            config,
            events,
            registry,
            lifecycle,
            predictor,
            balancer,
            optimizer,
            feedback,
            analyzer: Arc::new(HeuristicAnalyzer::new()),
            triggers: Arc::new(Notify::new()),
        }
    }

    /// Builds a service over one in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>, config: ServiceConfig) -> Self {
        let tasks: Arc<dyn TaskRepository> = store.clone();
        let annotators: Arc<dyn AnnotatorRepository> = store.clone();
        let predictions: Arc<dyn PredictionRepository> = store;
        Self::with_repositories(tasks, annotators, predictions, config)
    }

    /// Replaces the complexity analyzer.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn ComplexityAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Notified whenever an assignment pass may find new pairings.
    pub fn triggers(&self) -> Arc<Notify> {
        self.triggers.clone()
    }

    pub fn feedback(&self) -> &PerformanceFeedbackLoop {
        &self.feedback
    }

    pub fn registry(&self) -> &AnnotatorRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &TaskLifecycleManager {
        &self.lifecycle
    }

    fn wake(&self) {
        self.triggers.notify_one();
    }

    // Tasks

    /// Submits a task, estimating complexity with the analyzer.
    pub async fn submit_task(
        &self,
        content: impl Into<String>,
        task_type: impl Into<String>,
        priority: i32,
    ) -> Result<Task> {
        self.submit(TaskSubmission::new(content, task_type).with_priority(priority))
            .await
    }

    /// Submits a task described by `submission`.
    ///
    /// # Errors
    ///
    /// `Validation` for empty content or type, or out-of-range values;
    /// `Conflict` if an explicit id is taken. Analyzer failures never
    /// surface.
    pub async fn submit(&self, submission: TaskSubmission) -> Result<Task> {
        if submission.content.trim().is_empty() {
            return Err(ServiceError::Validation(
                "content must not be empty".to_string(),
            ));
        }
        if submission.task_type.trim().is_empty() {
            return Err(ServiceError::Validation(
                "task_type must not be empty".to_string(),
            ));
        }

        let (complexity, estimated_time) =
            match (submission.complexity_score, submission.estimated_time_secs) {
                (Some(c), Some(t)) => (c, t),
                (complexity, time) => {
                    let (estimate, source) = estimate_or_fallback(
                        self.analyzer.as_ref(),
                        &submission.content,
                        &submission.task_type,
                        self.config.analyzer.timeout(),
                    )
                    .await;
                    if source == EstimateSource::Fallback {
                        debug!(task_type = %submission.task_type, "Using heuristic estimate");
                    }
                    (
                        complexity.unwrap_or(estimate.complexity_score),
                        time.unwrap_or(estimate.estimated_time_secs),
                    )
                }
            };

        let mut builder = Task::builder(submission.content, submission.task_type)
            .priority(submission.priority)
            .complexity(complexity)
            .estimated_time(estimated_time)
            .min_skill(submission.min_skill);
        if let Some(id) = submission.id {
            builder = builder.id(id);
        }
        for language in submission.languages {
            builder = builder.language(language);
        }
        if let Some(context) = submission.cultural_context {
            builder = builder.cultural_context(context);
        }

        let task = self.lifecycle.submit(builder.build())?;
        self.wake();
        Ok(task)
    }

    pub fn get_task(&self, id: &TaskId) -> Result<Task> {
        Ok(self.lifecycle.get(id)?)
    }

    pub fn list_tasks(&self, filter: Option<TaskFilter>) -> Result<Vec<Task>> {
        Ok(self.lifecycle.list(filter)?)
    }

    /// Pending tasks in priority order, or the tasks an annotator holds.
    pub fn get_queue(&self, query: &QueueQuery) -> Result<Vec<Task>> {
        if let Some(annotator_id) = &query.annotator_id {
            self.registry.get(annotator_id)?;
        }
        Ok(self.lifecycle.get_queue(query)?)
    }

    /// Marks an Assigned task as started.
    pub fn start_task(&self, id: &TaskId) -> Result<Task> {
        Ok(self.lifecycle.start(id, Utc::now())?)
    }

    /// Fails an active task and releases its annotator.
    pub fn fail_task(&self, id: &TaskId, reason: &str) -> Result<Task> {
        let task = self.lifecycle.fail(id, reason, Utc::now())?;
        if let Some(annotator_id) = &task.previous_annotator {
            self.release(annotator_id);
        }
        self.wake();
        Ok(task)
    }

    /// Withdraws a Pending task.
    pub fn cancel_task(&self, id: &TaskId) -> Result<Task> {
        Ok(self.lifecycle.cancel(id)?)
    }

    fn release(&self, annotator_id: &AnnotatorId) {
        if let Err(e) = self.registry.release(annotator_id) {
            warn!(annotator_id = %annotator_id, error = %e, "Failed to release workload");
        }
    }

    // Assignment

    /// Runs one assignment pass now.
    pub fn run_assignment_pass(&self) -> Result<AssignmentReport> {
        self.run_assignment_pass_at(Utc::now())
    }

    /// Runs one assignment pass as of `now`.
    pub fn run_assignment_pass_at(&self, now: DateTime<Utc>) -> Result<AssignmentReport> {
        Ok(self.optimizer.run_pass(now)?)
    }

    /// Assigns a task to a named annotator.
    pub fn assign_specific(&self, task_id: &TaskId, annotator_id: &AnnotatorId) -> Result<Assignment> {
        Ok(self
            .optimizer
            .assign_specific(task_id, annotator_id, Utc::now())?)
    }

    /// Predicted quality for a pair, without assigning anything.
    pub fn predict_quality(&self, task_id: &TaskId, annotator_id: &AnnotatorId) -> Result<Prediction> {
        let task = self.lifecycle.get(task_id)?;
        let annotator = self.registry.get(annotator_id)?;
        let mut prediction = self.predictor.predict(&task, &annotator)?;
        let fatigue = self.balancer.fatigue(&annotator, Utc::now());
        self.predictor.advise_fatigue(&mut prediction, fatigue);
        Ok(prediction)
    }

    // Completion and feedback

    /// Completes a task with its realized quality.
    ///
    /// # Errors
    ///
    /// `Conflict` when the task was already completed or is not held by an
    /// annotator.
    pub fn complete_task(&self, id: &TaskId, quality_score: f64) -> Result<CompletionOutcome> {
        self.complete_task_at(id, quality_score, Utc::now())
    }

    pub fn complete_task_at(
        &self,
        id: &TaskId,
        quality_score: f64,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        let outcome = self.feedback.complete(id, quality_score, now)?;
        if outcome.recalibration_due {
            debug!(task_id = %id, "Recalibration due");
        }
        self.wake();
        Ok(outcome)
    }

    /// Retrains the quality model on all labelled records.
    pub fn recalibrate(&self) -> Result<Option<RecalibrationSummary>> {
        Ok(self.feedback.recalibrate()?)
    }

    /// Retrains only when enough new labelled records arrived.
    pub fn recalibrate_if_due(&self) -> Result<Option<RecalibrationSummary>> {
        Ok(self.feedback.recalibrate_if_due()?)
    }

    /// Rebuilds predictor state from stored records after a restart.
    pub fn restore(&self) -> Result<Option<RecalibrationSummary>> {
        let summary = self.feedback.restore()?;
        match &summary {
            Some(s) => info!(generation = s.generation, samples = s.samples, "Restored model"),
            None => debug!("Not enough labelled records to restore a model"),
        }
        Ok(summary)
    }

    // Annotators

    pub fn register_annotator(&self, annotator: Annotator) -> Result<Annotator> {
        let stored = self.registry.register(annotator)?;
        self.wake();
        Ok(stored)
    }

    pub fn update_availability(
        &self,
        id: &AnnotatorId,
        status: AvailabilityStatus,
    ) -> Result<Annotator> {
        let stored = self.registry.update_availability(id, status)?;
        if status == AvailabilityStatus::Available {
            self.wake();
        }
        Ok(stored)
    }

    /// Merges skill scores into an annotator's profile.
    pub fn update_skills(
        &self,
        id: &AnnotatorId,
        updates: &BTreeMap<String, f64>,
    ) -> Result<Annotator> {
        Ok(self.registry.update_skills(id, updates)?)
    }

    pub fn get_annotator(&self, id: &AnnotatorId) -> Result<Annotator> {
        Ok(self.registry.get(id)?)
    }

    pub fn list_annotators(&self) -> Result<Vec<Annotator>> {
        Ok(self.registry.list()?)
    }

    pub fn annotator_profile(&self, id: &AnnotatorId) -> Result<AnnotatorProfile> {
        Ok(self.registry.profile(id)?)
    }

    /// Profile plus the completed-work breakdown by task type and skill.
    pub fn annotator_analytics(&self, id: &AnnotatorId) -> Result<AnnotatorAnalytics> {
        let annotator = self.registry.get(id)?;
        let completed = self.lifecycle.list(Some(
            TaskFilter::new()
                .with_status(TaskStatus::Completed)
                .with_annotator(id.clone()),
        ))?;
        Ok(AnnotatorAnalytics::from_tasks(&annotator, &completed))
    }

    // Expiry

    /// Applies TTL rules as of `now` and releases the workload of every
    /// annotator whose assignment expired.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let report = self.lifecycle.sweep_expired(now)?;
        for annotator_id in report.released_annotators() {
            self.release(annotator_id);
        }
        if !report.failed.is_empty() || !report.requeued.is_empty() {
            self.wake();
        }
        Ok(report)
    }

    // Observability

    /// Logged events, newest first.
    pub fn events(&self, filter: Option<EventFilter>) -> Result<Vec<Event>> {
        Ok(self.events.list(filter)?)
    }

    /// Subscribes to events emitted from now on.
    pub fn subscribe(&self) -> Receiver<Event> {
        self.events.subscribe()
    }

    pub fn status(&self) -> Result<ServiceStatus> {
        let mut tasks = BTreeMap::new();
        for task in self.lifecycle.list(None)? {
            *tasks.entry(task.status.to_string()).or_insert(0) += 1;
        }

        let annotators = self.registry.list()?;
        let models = self.predictor.models()?;

        Ok(ServiceStatus {
            tasks,
            annotators: annotators.len(),
            available_annotators: annotators
                .iter()
                .filter(|a| a.availability_status == AvailabilityStatus::Available)
                .count(),
            workload: annotators.iter().map(|a| a.current_workload).sum(),
            capacity: annotators.iter().map(|a| a.capacity).sum(),
            model_trained: models.is_trained(),
            model_generation: models.generation,
            model_samples: models.samples,
            records_since_recalibration: self.feedback.records_since_recalibration()?,
            events_logged: self.events.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annoroute_models::{EventType, MatchStrategy};
    use annoroute_predict::Recommendation;

    fn service() -> AnnotationService {
        AnnotationService::in_memory(Arc::new(InMemoryStore::new()), ServiceConfig::default())
    }

    fn annotator(id: &str, capacity: u32, skill: f64) -> Annotator {
        Annotator::builder(id)
            .capacity(capacity)
            .skill("sentiment", skill)
            .build()
    }

    #[tokio::test]
    async fn test_submit_task_estimates_complexity() {
        let service = service();
        let task = service
            .submit_task("The movie was great. I loved it.", "sentiment", 3)
            .await
            .unwrap();

        let expected = HeuristicAnalyzer.analyze("The movie was great. I loved it.", "sentiment");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority_level, 3);
        assert_eq!(task.complexity_score, expected.complexity_score);
        assert_eq!(task.estimated_time, expected.estimated_time_secs);
        assert_eq!(task.version, 1);
    }

    #[tokio::test]
    async fn test_submit_keeps_explicit_values() {
        let service = service();
        let task = service
            .submit(
                TaskSubmission::new("text", "qa")
                    .with_id("t1")
                    .with_complexity(0.7)
                    .with_estimated_time(300)
                    .with_language("en")
                    .with_cultural_context("jp"),
            )
            .await
            .unwrap();

        assert_eq!(task.id, TaskId::from("t1"));
        assert_eq!(task.complexity_score, 0.7);
        assert_eq!(task.estimated_time, 300);
        assert!(task.requirements.languages.contains("en"));
        assert_eq!(task.requirements.cultural_context.as_deref(), Some("jp"));
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_content() {
        let service = service();
        let err = service.submit_task("  ", "qa", 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(service.list_tasks(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_rejects_unbounded_estimate() {
        let service = service();
        service.register_annotator(annotator("a1", 1, 0.9)).unwrap();
        let err = service
            .submit(TaskSubmission::new("text", "sentiment").with_estimated_time(u64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        service.run_assignment_pass().unwrap();
        let report = service.sweep_expired(Utc::now()).unwrap();
        assert_eq!(report.total(), 0);
        assert!(service.list_tasks(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_assign_and_complete_roundtrip() {
        let service = service();
        service.register_annotator(annotator("a1", 2, 0.9)).unwrap();
        let task = service.submit_task("good film", "sentiment", 1).await.unwrap();

        let report = service.run_assignment_pass().unwrap();
        assert_eq!(report.strategy, MatchStrategy::Hungarian);
        assert_eq!(report.annotator_for(&task.id), Some(&AnnotatorId::from("a1")));
        assert_eq!(service.get_annotator(&"a1".into()).unwrap().current_workload, 1);

        let outcome = service.complete_task(&task.id, 0.8).unwrap();
        assert_eq!(outcome.task.status, TaskStatus::Completed);
        assert_eq!(outcome.annotator.current_workload, 0);
        assert_eq!(outcome.annotator.performance_history, vec![0.8]);

        let again = service.complete_task(&task.id, 0.8).unwrap_err();
        assert!(matches!(again, ServiceError::Conflict(_)));
        let annotator = service.get_annotator(&"a1".into()).unwrap();
        assert_eq!(annotator.performance_history, vec![0.8]);
    }

    #[tokio::test]
    async fn test_fail_task_releases_workload() {
        let service = service();
        service.register_annotator(annotator("a1", 1, 0.9)).unwrap();
        let task = service.submit_task("good film", "sentiment", 1).await.unwrap();
        service.assign_specific(&task.id, &"a1".into()).unwrap();
        assert_eq!(service.get_annotator(&"a1".into()).unwrap().current_workload, 1);

        let failed = service.fail_task(&task.id, "annotator gave up").unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(service.get_annotator(&"a1".into()).unwrap().current_workload, 0);
    }

    #[test]
    fn test_not_found_errors() {
        let service = service();
        assert!(matches!(
            service.get_task(&"missing".into()),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.predict_quality(&"missing".into(), &"a1".into()),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.get_queue(&QueueQuery::new().with_annotator("ghost".into())),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_predict_quality_cold_start() {
        let service = service();
        service
            .register_annotator(
                Annotator::builder("a1")
                    .capacity(1)
                    .skill("sentiment", 0.9)
                    .history([0.6, 0.8])
                    .build(),
            )
            .unwrap();
        service.register_annotator(annotator("a2", 1, 0.9)).unwrap();
        let task = service.submit_task("good film", "sentiment", 1).await.unwrap();

        let seasoned = service.predict_quality(&task.id, &"a1".into()).unwrap();
        assert!(seasoned.cold_start);
        assert!((seasoned.predicted_quality - 0.7).abs() < 1e-9);
        assert_eq!(seasoned.confidence, 0.3);

        let newcomer = service.predict_quality(&task.id, &"a2".into()).unwrap();
        assert_eq!(newcomer.predicted_quality, 0.5);
    }

    #[tokio::test]
    async fn test_predict_quality_advises_break_when_fatigued() {
        let service = service();
        service
            .register_annotator(
                Annotator::builder("a1")
                    .capacity(1)
                    .skill("sentiment", 0.9)
                    .history([0.9, 0.8, 0.6, 0.4, 0.2])
                    .build(),
            )
            .unwrap();
        service.register_annotator(annotator("a2", 1, 0.9)).unwrap();
        let task = service.submit_task("good film", "sentiment", 1).await.unwrap();

        let tired = service.predict_quality(&task.id, &"a1".into()).unwrap();
        assert!(tired.recommendations.contains(&Recommendation::TakeBreak));

        let fresh = service.predict_quality(&task.id, &"a2".into()).unwrap();
        assert!(!fresh.recommendations.contains(&Recommendation::TakeBreak));
    }

    #[tokio::test]
    async fn test_annotator_analytics() {
        let service = service();
        service.register_annotator(annotator("a1", 2, 0.9)).unwrap();
        let done = service.submit_task("good film", "sentiment", 1).await.unwrap();
        let open = service.submit_task("bad film", "sentiment", 1).await.unwrap();
        service.assign_specific(&done.id, &"a1".into()).unwrap();
        service.assign_specific(&open.id, &"a1".into()).unwrap();
        service.complete_task(&done.id, 0.9).unwrap();

        let analytics = service.annotator_analytics(&"a1".into()).unwrap();

        assert_eq!(analytics.profile.total_tasks, 1);
        assert_eq!(analytics.task_type_distribution.get("sentiment"), Some(&1));
        let sentiment = analytics.skill_utilization["sentiment"];
        assert_eq!(sentiment.tasks_completed, 1);
        assert!((sentiment.utilization_rate - 1.0).abs() < 1e-9);
        assert!(matches!(
            service.annotator_analytics(&"ghost".into()),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_status_counts() {
        let service = service();
        service.register_annotator(annotator("a1", 3, 0.9)).unwrap();
        service
            .update_availability(&"a1".into(), AvailabilityStatus::Offline)
            .unwrap();
        let t1 = service.submit_task("one", "sentiment", 1).await.unwrap();
        service.submit_task("two", "sentiment", 1).await.unwrap();
        service.cancel_task(&t1.id).unwrap();

        let status = service.status().unwrap();
        assert_eq!(status.count(TaskStatus::Pending), 1);
        assert_eq!(status.count(TaskStatus::Cancelled), 1);
        assert_eq!(status.annotators, 1);
        assert_eq!(status.available_annotators, 0);
        assert_eq!(status.capacity, 3);
        assert!(!status.model_trained);

        let changes = service
            .events(Some(
                EventFilter::new().with_event_type(EventType::AnnotatorAvailabilityChanged),
            ))
            .unwrap();
        assert_eq!(changes.len(), 1);
    }
}
