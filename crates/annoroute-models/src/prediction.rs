//! Prediction features and records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AnnotatorId, TaskId};

/// Number of features in a [`FeatureVector`].
pub const FEATURE_COUNT: usize = 5;

/// Features describing a (task, annotator) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub task_complexity: f64,
    pub annotator_skill: f64,
    pub rolling_quality: f64,
    pub current_workload: f64,
    /// 1.0 when the cultural context matches or none is required.
    pub cultural_match: f64,
}

impl FeatureVector {
    /// Features in a fixed column order.
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.task_complexity,
            self.annotator_skill,
            self.rolling_quality,
            self.current_workload,
            self.cultural_match,
        ]
    }

    /// Column names matching [`FeatureVector::as_array`].
    pub fn names() -> [&'static str; FEATURE_COUNT] {
        [
            "task_complexity",
            "annotator_skill",
            "rolling_quality",
            "current_workload",
            "cultural_match",
        ]
    }
}

/// A prediction made at assignment time, labelled on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub task_id: TaskId,
    pub annotator_id: AnnotatorId,
    pub task_type: String,
    pub features: FeatureVector,
    pub predicted_quality: f64,
    pub anomaly_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_quality: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labelled_at: Option<DateTime<Utc>>,
}

impl PredictionRecord {
    /// Returns true once the realized quality is known.
    pub fn is_labelled(&self) -> bool {
        self.actual_quality.is_some()
    }

    /// Absolute prediction error, if labelled.
    pub fn error(&self) -> Option<f64> {
        self.actual_quality
            .map(|actual| (actual - self.predicted_quality).abs())
    }
}

/// Where the last recalibration attempt left off.
///
/// Stored with the prediction records so a restarted process knows how many
/// labelled records arrived since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalibrationMark {
    /// Labelled records that existed at the attempt.
    pub labelled_records: usize,
    pub attempted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> FeatureVector {
        FeatureVector {
            task_complexity: 0.4,
            annotator_skill: 0.9,
            rolling_quality: 0.8,
            current_workload: 1.0,
            cultural_match: 1.0,
        }
    }

    #[test]
    fn test_feature_order() {
        let arr = features().as_array();
        assert_eq!(arr[0], 0.4);
        assert_eq!(arr[1], 0.9);
        assert_eq!(arr[4], 1.0);
        assert_eq!(FeatureVector::names()[3], "current_workload");
    }

    #[test]
    fn test_record_error() {
        let mut record = PredictionRecord {
            task_id: TaskId::from("t1"),
            annotator_id: AnnotatorId::from("a1"),
            task_type: "qa".to_string(),
            features: features(),
            predicted_quality: 0.7,
            anomaly_score: 0.1,
            actual_quality: None,
            created_at: Utc::now(),
            labelled_at: None,
        };
        assert!(!record.is_labelled());
        assert!(record.error().is_none());

        record.actual_quality = Some(0.9);
        assert!(record.is_labelled());
        assert!((record.error().unwrap() - 0.2).abs() < 1e-9);
    }
}
