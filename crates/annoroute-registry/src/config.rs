//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the annotator registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Compare-and-set retries before a mutation gives up.
    pub max_cas_retries: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { max_cas_retries: 3 }
    }
}

impl RegistryConfig {
    /// Sets the compare-and-set retry bound.
    pub fn with_max_cas_retries(mut self, retries: u32) -> Self {
        self.max_cas_retries = retries;
        self
    }
}
