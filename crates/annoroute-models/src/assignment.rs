//! Assignment results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AnnotatorId, TaskId};

/// How a matching was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Exact minimum-cost matching.
    Hungarian,
    /// Per-task best match, used above the size threshold.
    Greedy,
    /// Operator chose the pair.
    Manual,
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchStrategy::Hungarian => "hungarian",
            MatchStrategy::Greedy => "greedy",
            MatchStrategy::Manual => "manual",
        };
        write!(f, "{}", s)
    }
}

/// A (task, annotator) pairing that was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: TaskId,
    pub annotator_id: AnnotatorId,
    pub predicted_quality: f64,
    pub cost: f64,
    pub created_at: DateTime<Utc>,
}

/// Why a pending task was left unassigned by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// No annotator passed the eligibility filters.
    NoEligibleAnnotator,
    /// Eligible annotators existed but the matching used them elsewhere.
    NotSelected,
    /// The pairing lost a compare-and-set race and was dropped.
    ConcurrencyConflict,
}

/// A task the pass did not assign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedTask {
    pub task_id: TaskId,
    pub reason: UnmatchedReason,
}

/// Outcome of one assignment pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentReport {
    pub strategy: MatchStrategy,
    pub assignments: Vec<Assignment>,
    pub unmatched: Vec<UnmatchedTask>,
    /// Pairings dropped after losing a compare-and-set race.
    pub conflicts: usize,
}

impl AssignmentReport {
    /// Creates an empty report.
    pub fn new(strategy: MatchStrategy) -> Self {
        Self {
            strategy,
            assignments: Vec::new(),
            unmatched: Vec::new(),
            conflicts: 0,
        }
    }

    /// Ids of tasks left Pending.
    pub fn unmatched_ids(&self) -> Vec<TaskId> {
        self.unmatched.iter().map(|u| u.task_id.clone()).collect()
    }

    /// Number of tasks with no eligible annotator.
    pub fn no_eligible_count(&self) -> usize {
        self.unmatched
            .iter()
            .filter(|u| u.reason == UnmatchedReason::NoEligibleAnnotator)
            .count()
    }

    /// Looks up the annotator a task was assigned to.
    pub fn annotator_for(&self, task_id: &TaskId) -> Option<&AnnotatorId> {
        self.assignments
            .iter()
            .find(|a| &a.task_id == task_id)
            .map(|a| &a.annotator_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_queries() {
        let mut report = AssignmentReport::new(MatchStrategy::Hungarian);
        report.assignments.push(Assignment {
            task_id: TaskId::from("t1"),
            annotator_id: AnnotatorId::from("a1"),
            predicted_quality: 0.8,
            cost: 0.1,
            created_at: Utc::now(),
        });
        report.unmatched.push(UnmatchedTask {
            task_id: TaskId::from("t2"),
            reason: UnmatchedReason::NoEligibleAnnotator,
        });
        report.unmatched.push(UnmatchedTask {
            task_id: TaskId::from("t3"),
            reason: UnmatchedReason::NotSelected,
        });

        assert_eq!(
            report.annotator_for(&TaskId::from("t1")),
            Some(&AnnotatorId::from("a1"))
        );
        assert!(report.annotator_for(&TaskId::from("t2")).is_none());
        assert_eq!(report.no_eligible_count(), 1);
        assert_eq!(report.unmatched_ids().len(), 2);
    }

    #[test]
    fn test_reason_serialization() {
        let json = serde_json::to_string(&UnmatchedReason::NoEligibleAnnotator).unwrap();
        assert_eq!(json, "\"no_eligible_annotator\"");
    }
}
