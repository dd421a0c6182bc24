//! WorkloadBalancer - fatigue from load and recent quality trend.

use annoroute_models::Annotator;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Fatigue model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueConfig {
    /// History entries used for the trend slope.
    pub trend_window: usize,
    /// Weight of `workload / capacity`.
    pub load_weight: f64,
    /// Weight of the quality decline term.
    pub trend_weight: f64,
    /// Slope (per entry) that counts as a full decline.
    pub slope_scale: f64,
    /// Fatigue above which new assignments are withheld.
    pub threshold: f64,
    /// Seconds after the last score when the trend stops counting.
    pub cooldown_secs: u64,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            trend_window: 5,
            load_weight: 0.6,
            trend_weight: 1.0,
            slope_scale: 0.1,
            threshold: 0.8,
            cooldown_secs: 3600,
        }
    }
}

impl FatigueConfig {
    /// Sets the exclusion threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the cooldown in seconds.
    pub fn with_cooldown_secs(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    /// Cooldown as a chrono duration.
    pub fn cooldown(&self) -> Duration {
        Duration::seconds(i64::try_from(self.cooldown_secs).unwrap_or(i64::MAX / 1000))
    }
}

/// Fatigue breakdown for one annotator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FatigueAssessment {
    /// Combined fatigue in [0, 1].
    pub score: f64,
    /// Load term, `workload / capacity`.
    pub load: f64,
    /// Decline term in [0, 1]; 0 once the cooldown has elapsed.
    pub decline: f64,
    /// True when the score is above the threshold.
    pub excluded: bool,
}

/// Derives fatigue scores. Stateless; availability stays with the registry.
#[derive(Debug, Clone, Default)]
pub struct WorkloadBalancer {
    config: FatigueConfig,
}

impl WorkloadBalancer {
    pub fn new(config: FatigueConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FatigueConfig {
        &self.config
    }

    /// Assesses an annotator at `now`.
    pub fn assess(&self, annotator: &Annotator, now: DateTime<Utc>) -> FatigueAssessment {
        let load = annotator.load_ratio();

        let cooled_down = annotator
            .last_performance_at
            .map(|at| now - at >= self.config.cooldown())
            .unwrap_or(false);

        let decline = if cooled_down {
            0.0
        } else {
            let slope = trend_slope(annotator.recent_history(self.config.trend_window));
            if self.config.slope_scale > 0.0 {
                (-slope / self.config.slope_scale).clamp(0.0, 1.0)
            } else {
                0.0
            }
        };

        let load_term = (self.config.load_weight * load).clamp(0.0, 1.0);
        let trend_term = (self.config.trend_weight * decline).clamp(0.0, 1.0);
        let score = (1.0 - (1.0 - load_term) * (1.0 - trend_term)).clamp(0.0, 1.0);

        FatigueAssessment {
            score,
            load,
            decline,
            excluded: score > self.config.threshold,
        }
    }

    /// Fatigue score only.
    pub fn fatigue(&self, annotator: &Annotator, now: DateTime<Utc>) -> f64 {
        self.assess(annotator, now).score
    }

    /// True when the annotator should not receive new work.
    pub fn is_excluded(&self, annotator: &Annotator, now: DateTime<Utc>) -> bool {
        self.assess(annotator, now).excluded
    }
}

/// Least-squares slope of `values` against their index; 0 below two points.
fn trend_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = values.iter().sum::<f64>() / n as f64;

    let (sxy, sxx) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sxy, sxx), (i, y)| {
            let dx = i as f64 - mean_x;
            (sxy + dx * (y - mean_y), sxx + dx * dx)
        });

    if sxx == 0.0 {
        0.0
    } else {
        sxy / sxx
    }
}
