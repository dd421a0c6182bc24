//! Complexity analysis for incoming tasks.
//!
//! Task intake asks a [`ComplexityAnalyzer`] for a complexity score and a
//! time estimate. The call is bounded by a timeout; on timeout, error, or an
//! out-of-range answer the deterministic [`HeuristicAnalyzer`] is used
//! instead, so intake never fails because the analyzer is unavailable.

use std::time::Duration;

use annoroute_models::MAX_ESTIMATED_TIME_SECS;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AnalyzerError;

/// Seconds of work per word before the task type multiplier.
const SECS_PER_WORD: f64 = 6.0;
/// Floor for time estimates.
const MIN_ESTIMATED_SECS: u64 = 60;

/// Complexity and time estimate for a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityEstimate {
    /// Complexity in [0, 1].
    pub complexity_score: f64,
    /// Estimated handling time in seconds.
    pub estimated_time_secs: u64,
}

/// Where an estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Analyzer,
    Fallback,
}

/// External complexity analysis.
#[async_trait]
pub trait ComplexityAnalyzer: Send + Sync {
    /// Estimates complexity and handling time for `content`.
    async fn estimate(
        &self,
        content: &str,
        task_type: &str,
    ) -> Result<ComplexityEstimate, AnalyzerError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Content-shape heuristic: length, word length, and sentence count.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Computes the estimate synchronously.
    pub fn analyze(&self, content: &str, task_type: &str) -> ComplexityEstimate {
        let words: Vec<&str> = content.split_whitespace().collect();

        ComplexityEstimate {
            complexity_score: complexity_score(content, &words),
            estimated_time_secs: estimated_time(words.len(), task_type),
        }
    }
}

#[async_trait]
impl ComplexityAnalyzer for HeuristicAnalyzer {
    async fn estimate(
        &self,
        content: &str,
        task_type: &str,
    ) -> Result<ComplexityEstimate, AnalyzerError> {
        Ok(self.analyze(content, task_type))
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

fn complexity_score(content: &str, words: &[&str]) -> f64 {
    if words.is_empty() {
        return 0.0;
    }

    let chars = content.chars().count() as f64;
    let avg_word_len =
        words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64;
    let sentences = content.split('.').filter(|s| !s.trim().is_empty()).count() as f64;

    let score = 0.3 * (chars / 1000.0).min(1.0)
        + 0.4 * (avg_word_len / 10.0).min(1.0)
        + 0.3 * (sentences / 10.0).min(1.0);
    score.min(1.0)
}

/// Relative effort of a task type.
pub fn type_multiplier(task_type: &str) -> f64 {
    match task_type {
        "sentiment" => 0.8,
        "classification" => 1.0,
        "translation" => 1.5,
        "summarization" => 1.2,
        "qa" => 1.3,
        _ => 1.0,
    }
}

fn estimated_time(words: usize, task_type: &str) -> u64 {
    let secs = (words as f64 * SECS_PER_WORD * type_multiplier(task_type)).round() as u64;
    secs.clamp(MIN_ESTIMATED_SECS, MAX_ESTIMATED_TIME_SECS)
}

fn check_estimate(estimate: ComplexityEstimate) -> Result<ComplexityEstimate, AnalyzerError> {
    if !(0.0..=1.0).contains(&estimate.complexity_score) {
        return Err(AnalyzerError::InvalidEstimate(format!(
            "complexity {} outside [0, 1]",
            estimate.complexity_score
        )));
    }
    if estimate.estimated_time_secs == 0 {
        return Err(AnalyzerError::InvalidEstimate(
            "estimated time must be positive".to_string(),
        ));
    }
    if estimate.estimated_time_secs > MAX_ESTIMATED_TIME_SECS {
        return Err(AnalyzerError::InvalidEstimate(format!(
            "estimated time {}s exceeds {}s",
            estimate.estimated_time_secs, MAX_ESTIMATED_TIME_SECS
        )));
    }
    Ok(estimate)
}

/// Asks `analyzer` for an estimate, falling back to the heuristic.
pub async fn estimate_or_fallback(
    analyzer: &dyn ComplexityAnalyzer,
    content: &str,
    task_type: &str,
    timeout: Duration,
) -> (ComplexityEstimate, EstimateSource) {
    let outcome = match tokio::time::timeout(timeout, analyzer.estimate(content, task_type)).await
    {
        Ok(result) => result.and_then(check_estimate),
        Err(_) => Err(AnalyzerError::Timeout(timeout)),
    };

    match outcome {
        Ok(estimate) => {
            debug!(
                analyzer = analyzer.name(),
                complexity = estimate.complexity_score,
                "Complexity estimated"
            );
            (estimate, EstimateSource::Analyzer)
        }
        Err(e) => {
            warn!(
                analyzer = analyzer.name(),
                error = %e,
                "Complexity analyzer failed, using heuristic"
            );
            (
                HeuristicAnalyzer.analyze(content, task_type),
                EstimateSource::Fallback,
            )
        }
    }
}
