//! Performance summaries.

use std::collections::BTreeMap;

use annoroute_models::{Annotator, AnnotatorId, AvailabilityStatus, Task, TaskStatus};
use serde::{Deserialize, Serialize};

/// Entries compared against the rest of the history for the trend.
const TREND_WINDOW: usize = 5;
/// Difference in means that counts as a trend.
const TREND_BAND: f64 = 0.1;
/// Entries returned as recent performance.
const RECENT_PERFORMANCE: usize = 10;

/// Direction of an annotator's recent quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTrend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl QualityTrend {
    /// Compares the mean of the last five scores with the mean of the rest.
    pub fn from_history(history: &[f64]) -> Self {
        if history.len() < TREND_WINDOW {
            return QualityTrend::InsufficientData;
        }

        let split = history.len() - TREND_WINDOW;
        let recent = mean(&history[split..]);
        let earlier = if split == 0 { recent } else { mean(&history[..split]) };

        if recent > earlier + TREND_BAND {
            QualityTrend::Improving
        } else if recent < earlier - TREND_BAND {
            QualityTrend::Declining
        } else {
            QualityTrend::Stable
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Performance metrics for one annotator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatorProfile {
    pub annotator_id: AnnotatorId,
    pub total_tasks: usize,
    pub average_quality: f64,
    pub quality_trend: QualityTrend,
    pub recent_performance: Vec<f64>,
    pub availability_status: AvailabilityStatus,
    pub current_workload: u32,
    pub capacity: u32,
}

impl AnnotatorProfile {
    /// Summarizes an annotator.
    pub fn from_annotator(annotator: &Annotator) -> Self {
        Self {
            annotator_id: annotator.id.clone(),
            total_tasks: annotator.performance_history.len(),
            average_quality: annotator.average_quality().unwrap_or(0.0),
            quality_trend: QualityTrend::from_history(&annotator.performance_history),
            recent_performance: annotator.recent_history(RECENT_PERFORMANCE).to_vec(),
            availability_status: annotator.availability_status,
            current_workload: annotator.current_workload,
            capacity: annotator.capacity,
        }
    }
}

/// How much of an annotator's completed work fell on one skill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillUtilization {
    pub score: f64,
    pub tasks_completed: usize,
    /// `tasks_completed / total_tasks`; 0 when nothing is recorded.
    pub utilization_rate: f64,
}

/// Profile plus the breakdown of completed work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatorAnalytics {
    pub profile: AnnotatorProfile,
    /// Completed tasks per task type.
    pub task_type_distribution: BTreeMap<String, usize>,
    /// Declared skills that have completed work behind them.
    pub skill_utilization: BTreeMap<String, SkillUtilization>,
    pub cultural_background: String,
    pub languages: Vec<String>,
}

impl AnnotatorAnalytics {
    /// Builds analytics from the annotator and the tasks it was assigned.
    ///
    /// Tasks that are not completed, or belong to someone else, are ignored.
    pub fn from_tasks<'a>(annotator: &Annotator, tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut task_type_distribution: BTreeMap<String, usize> = BTreeMap::new();
        for task in tasks {
            if task.status == TaskStatus::Completed
                && task.assigned_annotator.as_ref() == Some(&annotator.id)
            {
                *task_type_distribution.entry(task.task_type.clone()).or_insert(0) += 1;
            }
        }

        let profile = AnnotatorProfile::from_annotator(annotator);
        let skill_utilization = annotator
            .skill_scores
            .iter()
            .filter_map(|(skill, score)| {
                let completed = *task_type_distribution.get(skill)?;
                let utilization_rate = if profile.total_tasks == 0 {
                    0.0
                } else {
                    completed as f64 / profile.total_tasks as f64
                };
                Some((
                    skill.clone(),
                    SkillUtilization {
                        score: *score,
                        tasks_completed: completed,
                        utilization_rate,
                    },
                ))
            })
            .collect();

        Self {
            profile,
            task_type_distribution,
            skill_utilization,
            cultural_background: annotator.cultural_background.clone(),
            languages: annotator.languages.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_insufficient() {
        assert_eq!(
            QualityTrend::from_history(&[0.9, 0.8]),
            QualityTrend::InsufficientData
        );
    }

    #[test]
    fn test_trend_exactly_five_is_stable() {
        assert_eq!(
            QualityTrend::from_history(&[0.9, 0.1, 0.5, 0.3, 0.2]),
            QualityTrend::Stable
        );
    }

    #[test]
    fn test_trend_directions() {
        let declining = [0.9, 0.9, 0.9, 0.5, 0.5, 0.5, 0.5, 0.5];
        let improving = [0.3, 0.3, 0.3, 0.8, 0.8, 0.8, 0.8, 0.8];
        let stable = [0.7, 0.7, 0.7, 0.75, 0.75, 0.75, 0.75, 0.75];

        assert_eq!(QualityTrend::from_history(&declining), QualityTrend::Declining);
        assert_eq!(QualityTrend::from_history(&improving), QualityTrend::Improving);
        assert_eq!(QualityTrend::from_history(&stable), QualityTrend::Stable);
    }

    #[test]
    fn test_profile_from_annotator() {
        let annotator = Annotator::builder("A1")
            .capacity(3)
            .history((0..12).map(|i| i as f64 / 20.0))
            .build();

        let profile = AnnotatorProfile::from_annotator(&annotator);

        assert_eq!(profile.total_tasks, 12);
        assert_eq!(profile.recent_performance.len(), 10);
        assert_eq!(profile.quality_trend, QualityTrend::Improving);
        assert_eq!(profile.capacity, 3);
    }

    #[test]
    fn test_profile_empty_history() {
        let profile = AnnotatorProfile::from_annotator(&Annotator::new("A1", 1));
        assert_eq!(profile.total_tasks, 0);
        assert_eq!(profile.average_quality, 0.0);
        assert_eq!(profile.quality_trend, QualityTrend::InsufficientData);
    }

    #[test]
    fn test_analytics_counts_completed_work() {
        let annotator = Annotator::builder("A1")
            .capacity(3)
            .skill("translation", 0.9)
            .skill("sentiment", 0.6)
            .skill("qa", 0.4)
            .history([0.8, 0.7, 0.9, 0.6])
            .build();
        let other = AnnotatorId::from("A2");
        let now = chrono::Utc::now();

        let mut tasks = Vec::new();
        for task_type in ["translation", "translation", "sentiment", "ner"] {
            let mut task = Task::new("x", task_type);
            task.assign(annotator.id.clone(), now);
            task.status = TaskStatus::Completed;
            tasks.push(task);
        }
        let mut pending = Task::new("x", "qa");
        pending.assign(annotator.id.clone(), now);
        tasks.push(pending);
        let mut elsewhere = Task::new("x", "translation");
        elsewhere.assign(other, now);
        elsewhere.status = TaskStatus::Completed;
        tasks.push(elsewhere);

        let analytics = AnnotatorAnalytics::from_tasks(&annotator, &tasks);

        assert_eq!(analytics.task_type_distribution.get("translation"), Some(&2));
        assert_eq!(analytics.task_type_distribution.get("ner"), Some(&1));
        assert!(!analytics.task_type_distribution.contains_key("qa"));

        let translation = analytics.skill_utilization["translation"];
        assert_eq!(translation.tasks_completed, 2);
        assert_eq!(translation.score, 0.9);
        assert!((translation.utilization_rate - 0.5).abs() < 1e-9);
        assert!(!analytics.skill_utilization.contains_key("qa"));
        assert!(!analytics.skill_utilization.contains_key("ner"));
    }

    #[test]
    fn test_analytics_without_history() {
        let annotator = Annotator::builder("A1").capacity(1).skill("qa", 0.5).build();
        let analytics = AnnotatorAnalytics::from_tasks(&annotator, &[]);

        assert!(analytics.task_type_distribution.is_empty());
        assert!(analytics.skill_utilization.is_empty());
        assert_eq!(analytics.profile.total_tasks, 0);
    }
}
