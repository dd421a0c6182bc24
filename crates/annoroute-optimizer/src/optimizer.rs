//! AssignmentOptimizer - plans and applies assignment passes.

use std::sync::Arc;

use annoroute_events::EventBus;
use annoroute_lifecycle::{LifecycleError, TaskLifecycleManager};
use annoroute_models::{
    Annotator, AnnotatorId, Assignment, AssignmentReport, Event, MatchStrategy, PredictionRecord,
    Task, TaskId, TaskStatus, UnmatchedReason, UnmatchedTask,
};
use annoroute_persistence::PredictionRepository;
use annoroute_predict::{cultural_match, Prediction, QualityPredictor, WorkloadBalancer};
use annoroute_registry::{AnnotatorRegistry, EligibilityQuery, RegistryError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::OptimizerConfig;
use crate::cost::{pair_cost, priority_boost, quantize, CostInputs, COST_SCALE};
use crate::error::{OptimizerError, Result};
use crate::{greedy, hungarian};

/// A pairing chosen by the planner, not yet applied.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedPairing {
    /// The task as read for planning; its version guards the assignment.
    pub task: Task,
    pub annotator_id: AnnotatorId,
    pub prediction: Prediction,
    pub cost: f64,
}

/// A matching computed over one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentPlan {
    pub strategy: MatchStrategy,
    /// Pairings in task priority order.
    pub pairings: Vec<PlannedPairing>,
    pub unmatched: Vec<UnmatchedTask>,
    /// For greedy plans, the bound on how far the total may exceed the
    /// best matching of the same tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greedy_gap: Option<f64>,
}

struct Cell {
    cost: f64,
    prediction: Prediction,
}

/// Computes minimum-cost matchings and applies them with compare-and-set.
///
/// Planning reads one snapshot of Pending tasks and accepting annotators
/// and never mutates state. Applying re-checks each pairing against live
/// state: capacity is reserved on the annotator first, then the task is
/// moved to Assigned at the version planning saw. A pairing that loses
/// either race is dropped for this pass and the task stays Pending.
pub struct AssignmentOptimizer {
    registry: Arc<AnnotatorRegistry>,
    lifecycle: Arc<TaskLifecycleManager>,
    predictor: Arc<QualityPredictor>,
    predictions: Arc<dyn PredictionRepository>,
    events: Arc<EventBus>,
    balancer: WorkloadBalancer,
    config: OptimizerConfig,
}

impl AssignmentOptimizer {
    /// Creates an optimizer with default weights and fatigue settings.
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
            balancer: WorkloadBalancer::default(),
            config: OptimizerConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the workload balancer.
    pub fn with_balancer(mut self, balancer: WorkloadBalancer) -> Self {
        self.balancer = balancer;
        self
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Returns the workload balancer.
    pub fn balancer(&self) -> &WorkloadBalancer {
        &self.balancer
    }

    /// Plans and applies one pass over all Pending tasks.
    pub fn run_pass(&self, now: DateTime<Utc>) -> Result<AssignmentReport> {
        let plan = self.plan(now)?;
        self.apply_plan(plan, now)
    }

    /// Computes a matching without touching any state.
    pub fn plan(&self, now: DateTime<Utc>) -> Result<AssignmentPlan> {
        let tasks = self.lifecycle.pending_tasks()?;
        let annotators = self.candidates(now)?;
        let models = self.predictor.models()?;
        let max_priority = tasks.iter().map(|t| t.priority_level).max().unwrap_or(0);

        let mut unmatched = Vec::new();
        let mut rows: Vec<(Task, Vec<Option<Cell>>)> = Vec::with_capacity(tasks.len());

        for task in tasks {
            let query = EligibilityQuery::for_task(&task);
            let boost = priority_boost(task.priority_level, max_priority);

            let mut cells = Vec::with_capacity(annotators.len());
            for (annotator, fatigue) in &annotators {
                if !query.admits(annotator) {
                    cells.push(None);
                    continue;
                }
                let prediction = self.predictor.predict_with(&models, &task, annotator)?;
                let cost = self.cost(&task, annotator, *fatigue, boost, &prediction);
                cells.push(Some(Cell { cost, prediction }));
            }

            if cells.iter().all(Option::is_none) {
                debug!(task_id = %task.id, "No eligible annotator");
                unmatched.push(UnmatchedTask {
                    task_id: task.id.clone(),
                    reason: UnmatchedReason::NoEligibleAnnotator,
                });
                continue;
            }
            rows.push((task, cells));
        }

        let quantized: Vec<Vec<Option<i64>>> = rows
            .iter()
            .map(|(_, cells)| {
                cells
                    .iter()
                    .map(|cell| cell.as_ref().map(|c| quantize(c.cost)))
                    .collect()
            })
            .collect();

        let use_greedy = rows.len() > self.config.greedy_threshold
            || annotators.len() > self.config.greedy_threshold;

        let (strategy, matching, greedy_gap) = if use_greedy {
            let capacity: Vec<u32> = annotators
                .iter()
                .map(|(a, _)| a.capacity.saturating_sub(a.current_workload))
                .collect();
            let outcome = greedy::solve(&quantized, &capacity);
            let gap = outcome.gap as f64 / COST_SCALE;
            info!(
                tasks = rows.len(),
                annotators = annotators.len(),
                threshold = self.config.greedy_threshold,
                gap,
                "Instance above threshold, using greedy matching"
            );
            (MatchStrategy::Greedy, outcome.matching, Some(gap))
        } else {
            (
                MatchStrategy::Hungarian,
                hungarian::solve(&quantized, annotators.len()),
                None,
            )
        };

        let mut pairings = Vec::new();
        for ((task, mut cells), choice) in rows.into_iter().zip(matching) {
            let chosen = choice.and_then(|col| {
                let cell = cells.get_mut(col).and_then(Option::take)?;
                Some((annotators[col].0.id.clone(), cell))
            });
            match chosen {
                Some((annotator_id, cell)) => pairings.push(PlannedPairing {
                    task,
                    annotator_id,
                    prediction: cell.prediction,
                    cost: cell.cost,
                }),
                None => unmatched.push(UnmatchedTask {
                    task_id: task.id.clone(),
                    reason: UnmatchedReason::NotSelected,
                }),
            }
        }

        Ok(AssignmentPlan {
            strategy,
            pairings,
            unmatched,
            greedy_gap,
        })
    }

    /// Applies a plan pairing by pairing. Lost races are counted, not fatal.
    pub fn apply_plan(&self, plan: AssignmentPlan, now: DateTime<Utc>) -> Result<AssignmentReport> {
        let mut report = AssignmentReport::new(plan.strategy);
        report.unmatched = plan.unmatched;

        for pairing in plan.pairings {
            match self.apply(&pairing, now)? {
                Some(assignment) => report.assignments.push(assignment),
                None => {
                    report.conflicts += 1;
                    report.unmatched.push(UnmatchedTask {
                        task_id: pairing.task.id.clone(),
                        reason: UnmatchedReason::ConcurrencyConflict,
                    });
                }
            }
        }

        info!(
            strategy = %report.strategy,
            assigned = report.assignments.len(),
            unmatched = report.unmatched.len(),
            no_eligible = report.no_eligible_count(),
            conflicts = report.conflicts,
            "Assignment pass complete"
        );
        Ok(report)
    }

    /// Assigns one task to a named annotator, bypassing the matching.
    ///
    /// Runs the same eligibility checks and compare-and-set path as a pass.
    pub fn assign_specific(
        &self,
        task_id: &TaskId,
        annotator_id: &AnnotatorId,
        now: DateTime<Utc>,
    ) -> Result<Assignment> {
        let task = self.lifecycle.get(task_id)?;
        if task.status != TaskStatus::Pending {
            return Err(OptimizerError::NotPending {
                task_id: task_id.to_string(),
                status: task.status,
            });
        }

        let annotator = self.registry.get(annotator_id)?;
        let query = EligibilityQuery::for_task(&task);
        if let Some(reason) = ineligibility(&query, &annotator) {
            return Err(OptimizerError::NotEligible {
                task_id: task_id.to_string(),
                annotator_id: annotator_id.to_string(),
                reason,
            });
        }

        let fatigue = self.balancer.assess(&annotator, now);
        if fatigue.excluded {
            return Err(OptimizerError::NotEligible {
                task_id: task_id.to_string(),
                annotator_id: annotator_id.to_string(),
                reason: format!("fatigue {:.2} above threshold", fatigue.score),
            });
        }

        let max_priority = self
            .lifecycle
            .pending_tasks()?
            .iter()
            .map(|t| t.priority_level)
            .max()
            .unwrap_or(task.priority_level);
        let boost = priority_boost(task.priority_level, max_priority);
        let prediction = self.predictor.predict(&task, &annotator)?;
        let cost = self.cost(&task, &annotator, fatigue.score, boost, &prediction);

        let pairing = PlannedPairing {
            task,
            annotator_id: annotator_id.clone(),
            prediction,
            cost,
        };

        match self.apply(&pairing, now)? {
            Some(assignment) => {
                info!(
                    task_id = %task_id,
                    annotator_id = %annotator_id,
                    strategy = %MatchStrategy::Manual,
                    "Manual assignment applied"
                );
                Ok(assignment)
            }
            None => Err(OptimizerError::Conflict(task_id.to_string())),
        }
    }

    /// Annotators that accept work and are not held back by fatigue, by id.
    fn candidates(&self, now: DateTime<Utc>) -> Result<Vec<(Annotator, f64)>> {
        let mut candidates = Vec::new();
        for annotator in self.registry.list()? {
            if !annotator.accepts_work() {
                continue;
            }
            let fatigue = self.balancer.assess(&annotator, now);
            if fatigue.excluded {
                debug!(
                    annotator_id = %annotator.id,
                    fatigue = fatigue.score,
                    "Annotator held back by fatigue"
                );
                continue;
            }
            candidates.push((annotator, fatigue.score));
        }
        Ok(candidates)
    }

    fn cost(
        &self,
        task: &Task,
        annotator: &Annotator,
        fatigue: f64,
        boost: f64,
        prediction: &Prediction,
    ) -> f64 {
        let inputs = CostInputs {
            skill: annotator.skill_for(&task.task_type),
            predicted_quality: prediction.predicted_quality,
            fatigue,
            cultural_mismatch: !cultural_match(task, annotator),
            priority_boost: boost,
            anomaly_score: prediction.anomaly_score,
        };
        pair_cost(&inputs, &self.config)
    }

    /// Reserves capacity, then assigns the task. `None` means the pairing
    /// was dropped because live state no longer allows it.
    fn apply(&self, pairing: &PlannedPairing, now: DateTime<Utc>) -> Result<Option<Assignment>> {
        let task = &pairing.task;
        let annotator_id = &pairing.annotator_id;
        let query = EligibilityQuery::for_task(task);

        let reserved = self.registry.reserve_with(annotator_id, |annotator| {
            query.admits(annotator) && !self.balancer.is_excluded(annotator, now)
        });
        match reserved {
            Ok(_) => {}
            Err(
                e @ (RegistryError::Unavailable { .. }
                | RegistryError::Conflict { .. }
                | RegistryError::NotFound(_)),
            ) => {
                debug!(
                    task_id = %task.id,
                    annotator_id = %annotator_id,
                    error = %e,
                    "Dropping pairing, annotator changed"
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.lifecycle.assign(&task.id, task.version, annotator_id, now) {
            self.release_reservation(annotator_id);
            return match e {
                LifecycleError::Conflict { .. }
                | LifecycleError::InvalidTransition { .. }
                | LifecycleError::NotFound(_) => {
                    debug!(
                        task_id = %task.id,
                        annotator_id = %annotator_id,
                        error = %e,
                        "Dropping pairing, task changed"
                    );
                    Ok(None)
                }
                other => Err(other.into()),
            };
        }

        let record = PredictionRecord {
            task_id: task.id.clone(),
            annotator_id: annotator_id.clone(),
            task_type: task.task_type.clone(),
            features: pairing.prediction.features,
            predicted_quality: pairing.prediction.predicted_quality,
            anomaly_score: pairing.prediction.anomaly_score,
            actual_quality: None,
            created_at: now,
            labelled_at: None,
        };
        if let Err(e) = self.predictions.upsert_prediction(record) {
            warn!(task_id = %task.id, error = %e, "Failed to record prediction");
        }

        self.events.emit(Event::task_assigned(
            &task.id,
            annotator_id,
            pairing.prediction.predicted_quality,
            pairing.cost,
        ));

        Ok(Some(Assignment {
            task_id: task.id.clone(),
            annotator_id: annotator_id.clone(),
            predicted_quality: pairing.prediction.predicted_quality,
            cost: pairing.cost,
            created_at: now,
        }))
    }

    fn release_reservation(&self, annotator_id: &AnnotatorId) {
        if let Err(e) = self.registry.release(annotator_id) {
            warn!(annotator_id = %annotator_id, error = %e, "Failed to release reservation");
        }
    }
}

/// Why `annotator` fails `query`, if it does.
fn ineligibility(query: &EligibilityQuery, annotator: &Annotator) -> Option<String> {
    if query.admits(annotator) {
        return None;
    }
    let reason = if !annotator.has_capacity() {
        format!(
            "workload {}/{}",
            annotator.current_workload, annotator.capacity
        )
    } else if !annotator.accepts_work() {
        format!("status is {}", annotator.availability_status)
    } else if annotator.skill_for(&query.task_type) < query.min_skill {
        format!(
            "skill {:.2} below {:.2}",
            annotator.skill_for(&query.task_type),
            query.min_skill
        )
    } else if !annotator.speaks_all(&query.languages) {
        "missing a required language".to_string()
    } else {
        "cultural context not matched".to_string()
    };
    Some(reason)
}
