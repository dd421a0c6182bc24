//! Lifecycle configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// What happens to a task whose assignment outlived its allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Mark the task Failed.
    #[default]
    Fail,
    /// Return the task to Pending until it has been requeued
    /// `max_attempts` times, then mark it Failed.
    Requeue { max_attempts: u32 },
}

/// Configuration for the task lifecycle manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Seconds a task may sit in Pending before it expires.
    pub pending_ttl_secs: u64,
    /// Multiplier on `estimated_time` for the assignment deadline.
    pub buffer_factor: f64,
    /// Handling of overdue assignments.
    pub retry_policy: RetryPolicy,
    /// Compare-and-set retries for externally triggered transitions.
    pub max_cas_retries: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            pending_ttl_secs: 24 * 60 * 60,
            buffer_factor: 3.0,
            retry_policy: RetryPolicy::Fail,
            max_cas_retries: 3,
        }
    }
}

impl LifecycleConfig {
    /// Pending TTL as a duration.
    pub fn pending_ttl(&self) -> Duration {
        Duration::seconds(self.pending_ttl_secs as i64)
    }

    /// Sets the pending TTL in seconds.
    pub fn with_pending_ttl_secs(mut self, secs: u64) -> Self {
        self.pending_ttl_secs = secs;
        self
    }

    /// Sets the assignment buffer factor.
    pub fn with_buffer_factor(mut self, factor: f64) -> Self {
        self.buffer_factor = factor;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the compare-and-set retry bound.
    pub fn with_max_cas_retries(mut self, retries: u32) -> Self {
        self.max_cas_retries = retries;
        self
    }
}
