//! QualityPredictor - predicted quality, anomaly score, and confidence.
//!
//! The serving models live in an `RwLock<Arc<ModelSet>>`. Readers clone the
//! `Arc` and predict without holding the lock; recalibration trains new
//! models off to the side and swaps the `Arc` in one write, so predictions
//! already in flight keep using the models they started with.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use annoroute_models::{Annotator, AnnotatorId, FeatureVector, PredictionRecord, Task, FEATURE_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ensemble::{BaggedTrees, EnsembleParams};
use crate::error::{PredictError, Result};
use crate::features::{extract_features, NEUTRAL_QUALITY};
use crate::isolation::{IsolationForest, IsolationParams};
use crate::model::{ModelSet, Predictor};

/// Configuration for the quality predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Labelled records required before a model is trained.
    pub min_training_samples: usize,
    pub ensemble: EnsembleParams,
    pub isolation: IsolationParams,
    /// Confidence reported for pairs with no history.
    pub cold_start_confidence: f64,
    /// Pair observations at which the history share of confidence saturates.
    pub pair_history_saturation: u32,
    /// Complexity above which a task is flagged.
    pub high_complexity_risk: f64,
    /// Rolling quality below which an annotator is flagged.
    pub low_quality_risk: f64,
    /// Anomaly score above which a profile is flagged.
    pub anomaly_risk: f64,
    /// Predicted quality below which manual review is advised.
    pub manual_review_below: f64,
    /// Fatigue above which a break is advised.
    pub break_fatigue_above: f64,
    /// Cultural match below which context training is advised.
    pub cultural_training_below: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            min_training_samples: 50,
            ensemble: EnsembleParams::default(),
            isolation: IsolationParams::default(),
            cold_start_confidence: 0.3,
            pair_history_saturation: 10,
            high_complexity_risk: 0.8,
            low_quality_risk: 0.3,
            anomaly_risk: 0.7,
            manual_review_below: 0.6,
            break_fatigue_above: 0.7,
            cultural_training_below: 0.4,
        }
    }
}

impl PredictorConfig {
    /// Sets the minimum training corpus size.
    pub fn with_min_training_samples(mut self, samples: usize) -> Self {
        self.min_training_samples = samples;
        self
    }

    /// Sets the ensemble parameters.
    pub fn with_ensemble(mut self, params: EnsembleParams) -> Self {
        self.ensemble = params;
        self
    }

    /// Sets the isolation forest parameters.
    pub fn with_isolation(mut self, params: IsolationParams) -> Self {
        self.isolation = params;
        self
    }
}

/// Reasons a pairing deserves a second look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    HighComplexity,
    LowRollingQuality,
    CulturalMismatch,
    AnomalousProfile,
}

/// Follow-up actions suggested alongside a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ManualReview,
    MoreExperiencedAnnotator,
    TakeBreak,
    CulturalTraining,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Recommendation::ManualReview => "manual review for quality assurance",
            Recommendation::MoreExperiencedAnnotator => "assign a more experienced annotator",
            Recommendation::TakeBreak => "give the annotator a break",
            Recommendation::CulturalTraining => "cultural context training",
        };
        f.write_str(text)
    }
}

/// Prediction for one (task, annotator) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Expected realized quality in [0, 1].
    pub predicted_quality: f64,
    /// Outlier score in [0, 1]; 0 when no anomaly model is trained.
    pub anomaly_score: f64,
    /// How much to trust `predicted_quality`, in [0, 1].
    pub confidence: f64,
    /// True when the pair had no history.
    pub cold_start: bool,
    pub features: FeatureVector,
    pub risk_factors: Vec<RiskFactor>,
    /// Sorted and free of duplicates.
    pub recommendations: Vec<Recommendation>,
    /// Generation of the models that served the prediction.
    pub model_generation: u64,
}

/// Result of a successful recalibration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecalibrationSummary {
    pub samples: usize,
    pub generation: u64,
    /// Mean absolute error of the new model on its training corpus.
    pub training_error: f64,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
struct PairStats {
    count: u32,
    sum: f64,
}

impl PairStats {
    fn mean(&self) -> f64 {
        if self.count == 0 {
            NEUTRAL_QUALITY
        } else {
            self.sum / self.count as f64
        }
    }
}

type PairKey = (AnnotatorId, String);

/// Quality and anomaly predictor with atomic model swaps.
pub struct QualityPredictor {
    config: PredictorConfig,
    models: RwLock<Arc<ModelSet>>,
    pairs: RwLock<HashMap<PairKey, PairStats>>,
}

impl Default for QualityPredictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

impl QualityPredictor {
    /// Creates an untrained predictor.
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            models: RwLock::new(Arc::new(ModelSet::default())),
            pairs: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// The models currently serving predictions.
    pub fn models(&self) -> Result<Arc<ModelSet>> {
        let guard = self.models.read().map_err(|_| PredictError::LockPoisoned)?;
        Ok(Arc::clone(&guard))
    }

    /// Predicts with the current models.
    pub fn predict(&self, task: &Task, annotator: &Annotator) -> Result<Prediction> {
        let models = self.models()?;
        self.predict_with(&models, task, annotator)
    }

    /// Predicts with an explicit model set, so a batch can pin one generation.
    pub fn predict_with(
        &self,
        models: &ModelSet,
        task: &Task,
        annotator: &Annotator,
    ) -> Result<Prediction> {
        let features = extract_features(task, annotator);
        let row = features.as_array();
        let pair = self.pair_stats(&annotator.id, &task.task_type)?;

        let anomaly_score = models
            .anomaly
            .as_ref()
            .map(|m| m.predict(&row).clamp(0.0, 1.0))
            .unwrap_or(0.0);

        let (predicted_quality, confidence, cold_start) = if pair.count == 0 {
            let fallback = annotator.rolling_average().unwrap_or(NEUTRAL_QUALITY);
            (fallback, self.config.cold_start_confidence, true)
        } else {
            let saturation = self.config.pair_history_saturation.max(1) as f64;
            let history = (pair.count as f64 / saturation).min(1.0);
            match models.quality {
                Some(ref model) => (model.predict(&row), 0.5 + 0.3 + 0.2 * history, false),
                None => (pair.mean(), 0.5 + 0.2 * history, false),
            }
        };

        let risk_factors = self.risk_factors(&features, anomaly_score);
        let predicted_quality = predicted_quality.clamp(0.0, 1.0);
        let recommendations = self.recommendations(&features, predicted_quality);

        Ok(Prediction {
            predicted_quality,
            anomaly_score,
            confidence: confidence.clamp(0.0, 1.0),
            cold_start,
            features,
            risk_factors,
            recommendations,
            model_generation: models.generation,
        })
    }

    fn risk_factors(&self, features: &FeatureVector, anomaly_score: f64) -> Vec<RiskFactor> {
        let mut risks = Vec::new();
        if features.task_complexity > self.config.high_complexity_risk {
            risks.push(RiskFactor::HighComplexity);
        }
        if features.rolling_quality < self.config.low_quality_risk {
            risks.push(RiskFactor::LowRollingQuality);
        }
        if features.cultural_match < 0.5 {
            risks.push(RiskFactor::CulturalMismatch);
        }
        if anomaly_score > self.config.anomaly_risk {
            risks.push(RiskFactor::AnomalousProfile);
        }
        risks
    }

    fn recommendations(&self, features: &FeatureVector, predicted_quality: f64) -> Vec<Recommendation> {
        let mut advice = Vec::new();
        if predicted_quality < self.config.manual_review_below {
            advice.push(Recommendation::ManualReview);
        }
        if features.task_complexity > self.config.high_complexity_risk {
            advice.push(Recommendation::MoreExperiencedAnnotator);
        }
        if features.cultural_match < self.config.cultural_training_below {
            advice.push(Recommendation::CulturalTraining);
        }
        advice
    }

    /// Adds the break recommendation when `fatigue` is high.
    ///
    /// Fatigue depends on the clock and lives in the workload balancer, so
    /// callers that have it fold it in after predicting.
    pub fn advise_fatigue(&self, prediction: &mut Prediction, fatigue: f64) {
        if fatigue > self.config.break_fatigue_above
            && !prediction.recommendations.contains(&Recommendation::TakeBreak)
        {
            prediction.recommendations.push(Recommendation::TakeBreak);
            prediction.recommendations.sort();
        }
    }

    /// Records a realized quality for an (annotator, task type) pair.
    pub fn observe(&self, annotator_id: &AnnotatorId, task_type: &str, quality: f64) -> Result<()> {
        let mut pairs = self.pairs.write().map_err(|_| PredictError::LockPoisoned)?;
        let stats = pairs
            .entry((annotator_id.clone(), task_type.to_string()))
            .or_default();
        stats.count += 1;
        stats.sum += quality;
        Ok(())
    }

    /// Number of realized qualities seen for a pair.
    pub fn pair_observations(&self, annotator_id: &AnnotatorId, task_type: &str) -> Result<u32> {
        Ok(self.pair_stats(annotator_id, task_type)?.count)
    }

    fn pair_stats(&self, annotator_id: &AnnotatorId, task_type: &str) -> Result<PairStats> {
        let pairs = self.pairs.read().map_err(|_| PredictError::LockPoisoned)?;
        Ok(pairs
            .get(&(annotator_id.clone(), task_type.to_string()))
            .copied()
            .unwrap_or_default())
    }

    /// Replaces pair statistics with those implied by labelled records.
    pub fn rebuild_pair_stats(&self, records: &[PredictionRecord]) -> Result<()> {
        let mut rebuilt: HashMap<PairKey, PairStats> = HashMap::new();
        for record in records {
            if let Some(actual) = record.actual_quality {
                let stats = rebuilt
                    .entry((record.annotator_id.clone(), record.task_type.clone()))
                    .or_default();
                stats.count += 1;
                stats.sum += actual;
            }
        }

        let mut pairs = self.pairs.write().map_err(|_| PredictError::LockPoisoned)?;
        *pairs = rebuilt;
        Ok(())
    }

    /// Trains a new model set without installing it.
    ///
    /// # Errors
    ///
    /// `InsufficientData` when fewer than `min_training_samples` records are
    /// labelled.
    pub fn train(&self, records: &[PredictionRecord]) -> Result<(ModelSet, f64)> {
        let labelled: Vec<(&PredictionRecord, f64)> = records
            .iter()
            .filter_map(|r| r.actual_quality.map(|q| (r, q)))
            .collect();

        let need = self.config.min_training_samples.max(2);
        if labelled.len() < need {
            return Err(PredictError::InsufficientData {
                have: labelled.len(),
                need,
            });
        }

        let rows: Vec<[f64; FEATURE_COUNT]> =
            labelled.iter().map(|(r, _)| r.features.as_array()).collect();
        let targets: Vec<f64> = labelled.iter().map(|(_, q)| *q).collect();

        let quality = BaggedTrees::fit(&rows, &targets, &self.config.ensemble)?;
        let anomaly = IsolationForest::fit(&rows, &self.config.isolation)?;

        let training_error = rows
            .iter()
            .zip(&targets)
            .map(|(row, target)| (quality.predict(row) - target).abs())
            .sum::<f64>()
            / rows.len() as f64;

        let models = ModelSet {
            quality: Some(Arc::new(quality)),
            anomaly: Some(Arc::new(anomaly)),
            samples: rows.len(),
            generation: 0,
            trained_at: Some(Utc::now()),
        };
        Ok((models, training_error))
    }

    /// Retrains on `records` and swaps the new models in.
    ///
    /// On error the previous models keep serving.
    pub fn recalibrate(&self, records: &[PredictionRecord]) -> Result<RecalibrationSummary> {
        let (mut models, training_error) = match self.train(records) {
            Ok(trained) => trained,
            Err(e) => {
                debug!(error = %e, "Recalibration skipped");
                return Err(e);
            }
        };

        let mut guard = self.models.write().map_err(|_| PredictError::LockPoisoned)?;
        models.generation = guard.generation + 1;
        let trained_at = models.trained_at.unwrap_or_else(Utc::now);
        let summary = RecalibrationSummary {
            samples: models.samples,
            generation: models.generation,
            training_error,
            trained_at,
        };
        *guard = Arc::new(models);
        drop(guard);

        info!(
            generation = summary.generation,
            samples = summary.samples,
            training_error = summary.training_error,
            "Predictor recalibrated"
        );
        Ok(summary)
    }
}
