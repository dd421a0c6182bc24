//! Annotator registry for annotation task routing.
//!
//! The `AnnotatorRegistry` is the authoritative store of annotator state:
//! skills, availability, workload, and performance history. Every mutation
//! goes through a version-stamped compare-and-set, so concurrent assignment
//! passes can never push an annotator's workload past its capacity. Releases
//! and completions retry until they land; other writes give up after
//! `max_cas_retries`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use annoroute_events::EventBus;
//! use annoroute_models::Annotator;
//! use annoroute_persistence::InMemoryStore;
//! use annoroute_registry::{AnnotatorRegistry, EligibilityQuery};
//!
//! let registry = AnnotatorRegistry::new(Arc::new(InMemoryStore::new()), Arc::new(EventBus::new()));
//! registry
//!     .register(Annotator::builder("A1").capacity(2).skill("translation", 0.9).build())
//!     .unwrap();
//!
//! let eligible = registry
//!     .get_eligible(&EligibilityQuery::new("translation").with_min_skill(0.5))
//!     .unwrap();
//! assert_eq!(eligible.len(), 1);
//! ```

pub mod config;
pub mod eligibility;
pub mod error;
pub mod profile;
pub mod registry;

pub use config::RegistryConfig;
pub use eligibility::EligibilityQuery;
pub use error::{RegistryError, Result};
pub use profile::{AnnotatorAnalytics, AnnotatorProfile, QualityTrend, SkillUtilization};
pub use registry::AnnotatorRegistry;
