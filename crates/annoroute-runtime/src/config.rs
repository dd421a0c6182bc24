//! Service configuration.

use std::path::Path;
use std::time::Duration;

use annoroute_feedback::FeedbackConfig;
use annoroute_lifecycle::LifecycleConfig;
use annoroute_optimizer::OptimizerConfig;
use annoroute_predict::{FatigueConfig, PredictorConfig};
use annoroute_registry::RegistryConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Intervals of the background scheduler, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub assignment_interval_secs: u64,
    pub expiry_interval_secs: u64,
    pub recalibration_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            assignment_interval_secs: 30,
            expiry_interval_secs: 10,
            recalibration_interval_secs: 300,
        }
    }
}

impl SchedulerConfig {
    pub fn assignment_interval(&self) -> Duration {
        Duration::from_secs(self.assignment_interval_secs.max(1))
    }

    pub fn expiry_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_interval_secs.max(1))
    }

    pub fn recalibration_interval(&self) -> Duration {
        Duration::from_secs(self.recalibration_interval_secs.max(1))
    }

    /// Sets all three intervals.
    pub fn with_intervals(mut self, assignment: u64, expiry: u64, recalibration: u64) -> Self {
        self.assignment_interval_secs = assignment;
        self.expiry_interval_secs = expiry;
        self.recalibration_interval_secs = recalibration;
        self
    }
}

/// Configuration for the whole service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub registry: RegistryConfig,
    pub lifecycle: LifecycleConfig,
    pub predictor: PredictorConfig,
    pub fatigue: FatigueConfig,
    pub optimizer: OptimizerConfig,
    pub feedback: FeedbackConfig,
    pub scheduler: SchedulerConfig,
    pub analyzer: AnalyzerConfig,
    pub events: EventLogConfig,
}

/// Complexity analysis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Seconds before the analyzer is abandoned for the heuristic.
    pub timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

impl AnalyzerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Audit log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Events kept in memory before the oldest are dropped.
    pub capacity: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            capacity: annoroute_events::DEFAULT_LOG_CAPACITY,
        }
    }
}

impl ServiceConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Validation(format!("cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ServiceError::Validation(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Sets the lifecycle config.
    pub fn with_lifecycle(mut self, lifecycle: LifecycleConfig) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Sets the predictor config.
    pub fn with_predictor(mut self, predictor: PredictorConfig) -> Self {
        self.predictor = predictor;
        self
    }

    /// Sets the fatigue config.
    pub fn with_fatigue(mut self, fatigue: FatigueConfig) -> Self {
        self.fatigue = fatigue;
        self
    }

    /// Sets the optimizer config.
    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Sets the feedback config.
    pub fn with_feedback(mut self, feedback: FeedbackConfig) -> Self {
        self.feedback = feedback;
        self
    }

    /// Sets the scheduler config.
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }
}
