//! Annotator profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ids::AnnotatorId;

/// Number of most recent history entries that make up the rolling average.
pub const ROLLING_WINDOW: usize = 20;

/// Whether an annotator can receive work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    /// Accepting new assignments.
    #[default]
    Available,
    /// Temporarily not accepting work.
    Busy,
    /// Never eligible.
    Offline,
}

impl std::fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AvailabilityStatus::Available => "available",
            AvailabilityStatus::Busy => "busy",
            AvailabilityStatus::Offline => "offline",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AvailabilityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Ok(AvailabilityStatus::Available),
            "busy" => Ok(AvailabilityStatus::Busy),
            "offline" => Ok(AvailabilityStatus::Offline),
            other => Err(format!("unknown availability status: {}", other)),
        }
    }
}

/// A human annotator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotator {
    /// Identifier chosen at registration.
    pub id: AnnotatorId,

    /// Skill category to score in [0, 1].
    #[serde(default)]
    pub skill_scores: BTreeMap<String, f64>,

    /// Realized quality scores, oldest first.
    #[serde(default)]
    pub performance_history: Vec<f64>,

    /// Free-form cultural background description.
    #[serde(default)]
    pub cultural_background: String,

    /// Languages the annotator works in.
    #[serde(default)]
    pub languages: BTreeSet<String>,

    /// Externally settable availability.
    pub availability_status: AvailabilityStatus,

    /// Maximum concurrent active tasks.
    pub capacity: u32,

    /// Tasks currently Assigned or InProgress.
    #[serde(default)]
    pub current_workload: u32,

    /// When the annotator registered.
    pub created_at: DateTime<Utc>,

    /// Last profile mutation.
    pub updated_at: DateTime<Utc>,

    /// When the last quality score was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_performance_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency counter, stamped by the repository.
    #[serde(default)]
    pub version: u64,
}

impl Annotator {
    /// Creates an available annotator with the given capacity and no skills.
    pub fn new(id: impl Into<AnnotatorId>, capacity: u32) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            skill_scores: BTreeMap::new(),
            performance_history: Vec::new(),
            cultural_background: String::new(),
            languages: BTreeSet::new(),
            availability_status: AvailabilityStatus::Available,
            capacity,
            current_workload: 0,
            created_at: now,
            updated_at: now,
            last_performance_at: None,
            version: 0,
        }
    }

    /// Skill score for a task type; unknown categories score 0.
    pub fn skill_for(&self, task_type: &str) -> f64 {
        self.skill_scores.get(task_type).copied().unwrap_or(0.0)
    }

    /// Returns true if the annotator can take at least one more task.
    pub fn has_capacity(&self) -> bool {
        self.current_workload < self.capacity
    }

    /// Returns true if the annotator may receive new assignments.
    pub fn accepts_work(&self) -> bool {
        self.availability_status == AvailabilityStatus::Available && self.has_capacity()
    }

    /// Returns true if every required language is spoken.
    pub fn speaks_all<'a>(&self, required: impl IntoIterator<Item = &'a String>) -> bool {
        required.into_iter().all(|lang| {
            self.languages
                .iter()
                .any(|spoken| spoken.eq_ignore_ascii_case(lang))
        })
    }

    /// Returns true if the background shares a word with the context.
    ///
    /// Comparison is case-insensitive on alphanumeric words.
    pub fn matches_culture(&self, context: &str) -> bool {
        let background = words(&self.cultural_background);
        words(context).iter().any(|w| background.contains(w))
    }

    /// Mean of the most recent [`ROLLING_WINDOW`] scores.
    pub fn rolling_average(&self) -> Option<f64> {
        let start = self.performance_history.len().saturating_sub(ROLLING_WINDOW);
        mean(&self.performance_history[start..])
    }

    /// Mean of the whole history.
    pub fn average_quality(&self) -> Option<f64> {
        mean(&self.performance_history)
    }

    /// The last `k` history entries, oldest first.
    pub fn recent_history(&self, k: usize) -> &[f64] {
        let start = self.performance_history.len().saturating_sub(k);
        &self.performance_history[start..]
    }

    /// Fraction of capacity in use.
    pub fn load_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        (self.current_workload as f64 / self.capacity as f64).min(1.0)
    }
}

fn words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotator() -> Annotator {
        let mut a = Annotator::new("A1", 2);
        a.skill_scores.insert("translation".to_string(), 0.9);
        a.languages.insert("en".to_string());
        a.languages.insert("es".to_string());
        a.cultural_background = "Latin American, urban".to_string();
        a
    }

    #[test]
    fn test_missing_skill_scores_zero() {
        let a = annotator();
        assert_eq!(a.skill_for("translation"), 0.9);
        assert_eq!(a.skill_for("qa"), 0.0);
    }

    #[test]
    fn test_accepts_work() {
        let mut a = annotator();
        assert!(a.accepts_work());

        a.current_workload = 2;
        assert!(!a.accepts_work());

        a.current_workload = 0;
        a.availability_status = AvailabilityStatus::Offline;
        assert!(!a.accepts_work());
    }

    #[test]
    fn test_speaks_all() {
        let a = annotator();
        let en = "EN".to_string();
        let es = "es".to_string();
        let fr = "fr".to_string();

        assert!(a.speaks_all([&en, &es]));
        assert!(!a.speaks_all([&en, &fr]));
        assert!(a.speaks_all(std::iter::empty()));
    }

    #[test]
    fn test_matches_culture() {
        let a = annotator();
        assert!(a.matches_culture("latin"));
        assert!(a.matches_culture("Urban youth"));
        assert!(!a.matches_culture("East Asian"));
    }

    #[test]
    fn test_rolling_average_uses_recent_window() {
        let mut a = annotator();
        assert!(a.rolling_average().is_none());

        a.performance_history = vec![0.0; 10];
        a.performance_history.extend(vec![1.0; ROLLING_WINDOW]);

        assert_eq!(a.rolling_average(), Some(1.0));
        assert!(a.average_quality().unwrap() < 1.0);
    }

    #[test]
    fn test_recent_history() {
        let mut a = annotator();
        a.performance_history = vec![0.1, 0.2, 0.3];
        assert_eq!(a.recent_history(2), &[0.2, 0.3]);
        assert_eq!(a.recent_history(5).len(), 3);
    }

    #[test]
    fn test_availability_from_str() {
        assert_eq!("Busy".parse::<AvailabilityStatus>(), Ok(AvailabilityStatus::Busy));
        assert!("gone".parse::<AvailabilityStatus>().is_err());
    }
}
