//! Quality prediction and workload signals for annotation task routing.
//!
//! - [`QualityPredictor`] estimates the realized quality of a (task,
//!   annotator) pair with a bagged regression-tree ensemble and scores how
//!   atypical the pair's features are with an isolation forest. Both models
//!   sit behind the [`Predictor`] trait and are swapped in atomically on
//!   recalibration.
//! - [`WorkloadBalancer`] turns an annotator's load and recent quality trend
//!   into a fatigue score and decides when to hold them back from new work.
//!
//! Everything here is a pure function of the snapshot it is handed, apart
//! from the predictor's model slot and pair statistics.

pub mod ensemble;
pub mod error;
pub mod features;
pub mod isolation;
pub mod model;
pub mod quality;
pub mod tree;
pub mod workload;

pub use ensemble::{BaggedTrees, EnsembleParams};
pub use error::{PredictError, Result};
pub use features::{cultural_match, extract_features};
pub use isolation::{IsolationForest, IsolationParams};
pub use model::{ModelSet, Predictor};
pub use quality::{
    Prediction, PredictorConfig, QualityPredictor, RecalibrationSummary, Recommendation, RiskFactor,
};
pub use tree::{RegressionTree, TreeParams};
pub use workload::{FatigueAssessment, FatigueConfig, WorkloadBalancer};
