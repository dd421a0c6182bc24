//! AnnotatorRegistry - authoritative annotator state.

use std::collections::BTreeMap;
use std::sync::Arc;

use annoroute_events::EventBus;
use annoroute_models::{Annotator, AnnotatorId, AvailabilityStatus, Event, EventType};
use annoroute_persistence::AnnotatorRepository;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::eligibility::EligibilityQuery;
use crate::error::{RegistryError, Result};
use crate::profile::AnnotatorProfile;

/// Registry of annotators backed by a versioned repository.
///
/// All writes are read-modify-compare-and-set loops. A write that keeps
/// losing to concurrent writers gives up after
/// [`RegistryConfig::max_cas_retries`] retries with
/// [`RegistryError::Conflict`], leaving the stored record unchanged.
///
/// [`release`](Self::release) and
/// [`record_completion`](Self::record_completion) are the exception: they
/// apply the annotator side of a task transition that has already
/// committed, so they retry until they land.
pub struct AnnotatorRegistry {
    repo: Arc<dyn AnnotatorRepository>,
    events: Arc<EventBus>,
    config: RegistryConfig,
}

impl AnnotatorRegistry {
    /// Creates a registry with the default configuration.
    pub fn new(repo: Arc<dyn AnnotatorRepository>, events: Arc<EventBus>) -> Self {
        Self::with_config(repo, events, RegistryConfig::default())
    }

    /// Creates a registry with an explicit configuration.
    pub fn with_config(
        repo: Arc<dyn AnnotatorRepository>,
        events: Arc<EventBus>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            repo,
            events,
            config,
        }
    }

    /// Registers a new annotator.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank id, zero capacity, non-zero starting
    /// workload, or any score outside [0, 1]; `AlreadyExists` if the id is
    /// taken.
    pub fn register(&self, mut annotator: Annotator) -> Result<Annotator> {
        validate_new(&annotator)?;

        let now = Utc::now();
        annotator.created_at = now;
        annotator.updated_at = now;

        let stored = self.repo.insert_annotator(annotator)?;
        info!(
            annotator_id = %stored.id,
            capacity = stored.capacity,
            skills = stored.skill_scores.len(),
            "Registered annotator"
        );

        self.events.emit(
            Event::builder(EventType::AnnotatorRegistered, "Annotator registered")
                .annotator(stored.id.clone())
                .build(),
        );

        Ok(stored)
    }

    /// Gets an annotator by id.
    pub fn get(&self, id: &AnnotatorId) -> Result<Annotator> {
        Ok(self.repo.get_annotator(id)?)
    }

    /// Lists all annotators ordered by id.
    pub fn list(&self) -> Result<Vec<Annotator>> {
        Ok(self.repo.list_annotators()?)
    }

    /// Sets an annotator's availability.
    ///
    /// Emits `AnnotatorAvailabilityChanged` when the status actually changes.
    pub fn update_availability(
        &self,
        id: &AnnotatorId,
        status: AvailabilityStatus,
    ) -> Result<Annotator> {
        let mut previous = status;
        let stored = self.update_with(id, |annotator| {
            previous = annotator.availability_status;
            annotator.availability_status = status;
            Ok(())
        })?;

        if previous != status {
            info!(annotator_id = %id, from = %previous, to = %status, "Availability changed");
            self.events
                .emit(Event::availability_changed(id, previous, status));
        }

        Ok(stored)
    }

    /// Merges skill scores; categories not in `updates` are unchanged.
    ///
    /// # Errors
    ///
    /// `Validation` if any merged score falls outside [0, 1]. Nothing is
    /// written in that case.
    pub fn update_skills(
        &self,
        id: &AnnotatorId,
        updates: &BTreeMap<String, f64>,
    ) -> Result<Annotator> {
        for (category, score) in updates {
            validate_score(category, *score)?;
        }

        let stored = self.update_with(id, |annotator| {
            for (category, score) in updates {
                annotator.skill_scores.insert(category.clone(), *score);
            }
            Ok(())
        })?;

        debug!(annotator_id = %id, updated = updates.len(), "Updated skills");
        Ok(stored)
    }

    /// Annotators satisfying the query, ordered by id.
    pub fn get_eligible(&self, query: &EligibilityQuery) -> Result<Vec<Annotator>> {
        Ok(self
            .repo
            .list_annotators()?
            .into_iter()
            .filter(|a| query.admits(a))
            .collect())
    }

    /// Reserves one unit of capacity if the annotator is Available, has
    /// room, and passes `admit`.
    ///
    /// `admit` is re-evaluated against fresh state on every retry.
    pub fn reserve_with<F>(&self, id: &AnnotatorId, admit: F) -> Result<Annotator>
    where
        F: Fn(&Annotator) -> bool,
    {
        let stored = self.update_with(id, |annotator| {
            if annotator.availability_status != AvailabilityStatus::Available {
                return Err(RegistryError::Unavailable {
                    id: annotator.id.to_string(),
                    reason: format!("status is {}", annotator.availability_status),
                });
            }
            if !annotator.has_capacity() {
                return Err(RegistryError::Unavailable {
                    id: annotator.id.to_string(),
                    reason: format!(
                        "workload {}/{}",
                        annotator.current_workload, annotator.capacity
                    ),
                });
            }
            if !admit(annotator) {
                return Err(RegistryError::Unavailable {
                    id: annotator.id.to_string(),
                    reason: "no longer eligible".to_string(),
                });
            }
            annotator.current_workload += 1;
            Ok(())
        })?;

        debug!(
            annotator_id = %id,
            workload = stored.current_workload,
            capacity = stored.capacity,
            "Reserved capacity"
        );
        Ok(stored)
    }

    /// Reserves one unit of capacity.
    pub fn reserve(&self, id: &AnnotatorId) -> Result<Annotator> {
        self.reserve_with(id, |_| true)
    }

    /// Releases one unit of capacity. Workload never goes below zero.
    ///
    /// Version conflicts are retried without bound.
    pub fn release(&self, id: &AnnotatorId) -> Result<Annotator> {
        let stored = self.update_until_stored(id, |annotator| {
            if annotator.current_workload == 0 {
                warn!(annotator_id = %annotator.id, "Release with zero workload");
            }
            annotator.current_workload = annotator.current_workload.saturating_sub(1);
            Ok(())
        })?;

        debug!(annotator_id = %id, workload = stored.current_workload, "Released capacity");
        Ok(stored)
    }

    /// Appends a realized quality score and releases one unit of capacity
    /// in a single compare-and-set.
    ///
    /// Version conflicts are retried without bound.
    pub fn record_completion(
        &self,
        id: &AnnotatorId,
        quality: f64,
        at: DateTime<Utc>,
    ) -> Result<Annotator> {
        validate_score("quality_score", quality)?;

        let stored = self.update_until_stored(id, |annotator| {
            annotator.performance_history.push(quality);
            annotator.current_workload = annotator.current_workload.saturating_sub(1);
            annotator.last_performance_at = Some(at);
            Ok(())
        })?;

        debug!(
            annotator_id = %id,
            quality,
            history = stored.performance_history.len(),
            "Recorded completion"
        );
        Ok(stored)
    }

    /// Performance summary for an annotator.
    pub fn profile(&self, id: &AnnotatorId) -> Result<AnnotatorProfile> {
        let annotator = self.get(id)?;
        Ok(AnnotatorProfile::from_annotator(&annotator))
    }

    fn update_with<F>(&self, id: &AnnotatorId, mutate: F) -> Result<Annotator>
    where
        F: FnMut(&mut Annotator) -> Result<()>,
    {
        self.update_bounded(id, Some(self.config.max_cas_retries), mutate)
    }

    fn update_until_stored<F>(&self, id: &AnnotatorId, mutate: F) -> Result<Annotator>
    where
        F: FnMut(&mut Annotator) -> Result<()>,
    {
        self.update_bounded(id, None, mutate)
    }

    fn update_bounded<F>(
        &self,
        id: &AnnotatorId,
        max_retries: Option<u32>,
        mut mutate: F,
    ) -> Result<Annotator>
    where
        F: FnMut(&mut Annotator) -> Result<()>,
    {
        let mut attempts: u32 = 0;
        loop {
            let current = self.repo.get_annotator(id)?;
            let mut next = current.clone();
            mutate(&mut next)?;
            next.updated_at = Utc::now();

            match self.repo.compare_and_set_annotator(current.version, next) {
                Ok(stored) => return Ok(stored),
                Err(e) if e.is_conflict() => {
                    attempts = attempts.saturating_add(1);
                    if max_retries.is_some_and(|max| attempts > max) {
                        warn!(annotator_id = %id, attempts, "Giving up after version conflicts");
                        return Err(RegistryError::Conflict {
                            id: id.to_string(),
                            attempts,
                        });
                    }
                    debug!(annotator_id = %id, attempts, "Version conflict, retrying");
                    if max_retries.is_none() {
                        std::thread::yield_now();
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn validate_score(name: &str, score: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&score) {
        return Err(RegistryError::Validation(format!(
            "{} must be within [0, 1], got {}",
            name, score
        )));
    }
    Ok(())
}

fn validate_new(annotator: &Annotator) -> Result<()> {
    if annotator.id.is_blank() {
        return Err(RegistryError::Validation(
            "annotator id must not be empty".to_string(),
        ));
    }
    if annotator.capacity == 0 {
        return Err(RegistryError::Validation(
            "capacity must be at least 1".to_string(),
        ));
    }
    if annotator.current_workload != 0 {
        return Err(RegistryError::Validation(
            "current_workload must start at 0".to_string(),
        ));
    }
    for (category, score) in &annotator.skill_scores {
        validate_score(category, *score)?;
    }
    for score in &annotator.performance_history {
        validate_score("performance_history entry", *score)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use annoroute_persistence::InMemoryStore;
    use std::thread;

    fn make_registry() -> AnnotatorRegistry {
        AnnotatorRegistry::new(Arc::new(InMemoryStore::new()), Arc::new(EventBus::new()))
    }

    fn annotator(id: &str, capacity: u32, skill: f64) -> Annotator {
        Annotator::builder(id)
            .capacity(capacity)
            .skill("translation", skill)
            .build()
    }

    #[test]
    fn test_register_and_get() {
        let registry = make_registry();
        let stored = registry.register(annotator("A1", 2, 0.9)).unwrap();

        assert_eq!(stored.version, 1);
        assert_eq!(registry.get(&"A1".into()).unwrap().capacity, 2);
    }

    #[test]
    fn test_register_duplicate() {
        let registry = make_registry();
        registry.register(annotator("A1", 2, 0.9)).unwrap();

        let result = registry.register(annotator("A1", 5, 0.1));
        assert!(matches!(result, Err(RegistryError::AlreadyExists(_))));
        assert_eq!(registry.get(&"A1".into()).unwrap().capacity, 2);
    }

    #[test]
    fn test_register_validation() {
        let registry = make_registry();

        assert!(matches!(
            registry.register(annotator(" ", 1, 0.5)),
            Err(RegistryError::Validation(_))
        ));
        assert!(matches!(
            registry.register(annotator("A1", 0, 0.5)),
            Err(RegistryError::Validation(_))
        ));
        assert!(matches!(
            registry.register(annotator("A1", 1, 1.5)),
            Err(RegistryError::Validation(_))
        ));
        assert!(matches!(
            registry.register(Annotator::builder("A1").workload(1).capacity(2).build()),
            Err(RegistryError::Validation(_))
        ));
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_get_missing() {
        let registry = make_registry();
        assert!(matches!(
            registry.get(&"nobody".into()),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_availability_bumps_version_and_emits() {
        let events = Arc::new(EventBus::new());
        let registry = AnnotatorRegistry::new(Arc::new(InMemoryStore::new()), events.clone());
        registry.register(annotator("A1", 1, 0.5)).unwrap();
        let rx = events.subscribe();

        let updated = registry
            .update_availability(&"A1".into(), AvailabilityStatus::Offline)
            .unwrap();

        assert_eq!(updated.availability_status, AvailabilityStatus::Offline);
        assert_eq!(updated.version, 2);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type, EventType::AnnotatorAvailabilityChanged);
    }

    #[test]
    fn test_update_availability_same_status_no_event() {
        let events = Arc::new(EventBus::new());
        let registry = AnnotatorRegistry::new(Arc::new(InMemoryStore::new()), events.clone());
        registry.register(annotator("A1", 1, 0.5)).unwrap();
        let rx = events.subscribe();

        registry
            .update_availability(&"A1".into(), AvailabilityStatus::Available)
            .unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_update_skills_merges() {
        let registry = make_registry();
        registry.register(annotator("A1", 1, 0.5)).unwrap();

        let mut updates = BTreeMap::new();
        updates.insert("qa".to_string(), 0.8);
        let updated = registry.update_skills(&"A1".into(), &updates).unwrap();

        assert_eq!(updated.skill_for("qa"), 0.8);
        assert_eq!(updated.skill_for("translation"), 0.5);
    }

    #[test]
    fn test_update_skills_rejects_out_of_range() {
        let registry = make_registry();
        registry.register(annotator("A1", 1, 0.5)).unwrap();

        let mut updates = BTreeMap::new();
        updates.insert("qa".to_string(), 0.8);
        updates.insert("translation".to_string(), -0.1);

        assert!(matches!(
            registry.update_skills(&"A1".into(), &updates),
            Err(RegistryError::Validation(_))
        ));
        let stored = registry.get(&"A1".into()).unwrap();
        assert_eq!(stored.skill_for("qa"), 0.0);
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn test_get_eligible_filters() {
        let registry = make_registry();
        registry.register(annotator("A2", 1, 0.4)).unwrap();
        registry.register(annotator("A1", 1, 0.9)).unwrap();
        registry.register(annotator("A3", 1, 0.95)).unwrap();
        registry
            .update_availability(&"A3".into(), AvailabilityStatus::Offline)
            .unwrap();

        let eligible = registry
            .get_eligible(&EligibilityQuery::new("translation").with_min_skill(0.5))
            .unwrap();

        let ids: Vec<&str> = eligible.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["A1"]);

        let all = registry
            .get_eligible(&EligibilityQuery::new("translation"))
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id.as_str(), "A1");
    }

    #[test]
    fn test_reserve_until_full() {
        let registry = make_registry();
        registry.register(annotator("A1", 2, 0.9)).unwrap();

        registry.reserve(&"A1".into()).unwrap();
        let second = registry.reserve(&"A1".into()).unwrap();
        assert_eq!(second.current_workload, 2);

        let third = registry.reserve(&"A1".into());
        assert!(matches!(third, Err(RegistryError::Unavailable { .. })));
        assert_eq!(registry.get(&"A1".into()).unwrap().current_workload, 2);
    }

    #[test]
    fn test_reserve_refuses_busy_and_failed_admit() {
        let registry = make_registry();
        registry.register(annotator("A1", 2, 0.9)).unwrap();

        assert!(registry.reserve_with(&"A1".into(), |_| false).is_err());

        registry
            .update_availability(&"A1".into(), AvailabilityStatus::Busy)
            .unwrap();
        assert!(registry.reserve(&"A1".into()).is_err());
        assert_eq!(registry.get(&"A1".into()).unwrap().current_workload, 0);
    }

    #[test]
    fn test_release_saturates() {
        let registry = make_registry();
        registry.register(annotator("A1", 2, 0.9)).unwrap();
        registry.reserve(&"A1".into()).unwrap();

        assert_eq!(registry.release(&"A1".into()).unwrap().current_workload, 0);
        assert_eq!(registry.release(&"A1".into()).unwrap().current_workload, 0);
    }

    #[test]
    fn test_record_completion() {
        let registry = make_registry();
        registry.register(annotator("A1", 2, 0.9)).unwrap();
        registry.reserve(&"A1".into()).unwrap();

        let now = Utc::now();
        let stored = registry.record_completion(&"A1".into(), 0.85, now).unwrap();

        assert_eq!(stored.performance_history, vec![0.85]);
        assert_eq!(stored.current_workload, 0);
        assert_eq!(stored.last_performance_at, Some(now));

        assert!(matches!(
            registry.record_completion(&"A1".into(), 1.2, now),
            Err(RegistryError::Validation(_))
        ));
    }

    #[test]
    fn test_profile() {
        let registry = make_registry();
        registry
            .register(
                Annotator::builder("A1")
                    .capacity(1)
                    .history([0.8, 0.9])
                    .build(),
            )
            .unwrap();

        let profile = registry.profile(&"A1".into()).unwrap();
        assert_eq!(profile.total_tasks, 2);
        assert!((profile.average_quality - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_reserve_never_exceeds_capacity() {
        let registry = Arc::new(AnnotatorRegistry::with_config(
            Arc::new(InMemoryStore::new()),
            Arc::new(EventBus::new()),
            RegistryConfig::default().with_max_cas_retries(100),
        ));
        registry.register(annotator("A1", 3, 0.9)).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let r = Arc::clone(&registry);
                thread::spawn(move || r.reserve(&"A1".into()).is_ok())
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(granted, 3);
        assert_eq!(registry.get(&"A1".into()).unwrap().current_workload, 3);
    }

    #[test]
    fn test_completion_survives_contention_without_retries() {
        let registry = Arc::new(AnnotatorRegistry::with_config(
            Arc::new(InMemoryStore::new()),
            Arc::new(EventBus::new()),
            RegistryConfig::default().with_max_cas_retries(0),
        ));
        registry.register(annotator("A1", 400, 0.5)).unwrap();
        for _ in 0..400 {
            registry.reserve(&"A1".into()).unwrap();
        }

        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let r = Arc::clone(&registry);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    let mut updates = BTreeMap::new();
                    updates.insert(format!("skill-{}", i), 0.5);
                    while !stop.load(std::sync::atomic::Ordering::SeqCst) {
                        let _ = r.update_skills(&"A1".into(), &updates);
                    }
                })
            })
            .collect();

        let now = Utc::now();
        for i in 0..200 {
            registry
                .record_completion(&"A1".into(), 0.8, now)
                .unwrap();
            if i % 2 == 0 {
                registry.release(&"A1".into()).unwrap();
            }
        }

        stop.store(true, std::sync::atomic::Ordering::SeqCst);
        for handle in writers {
            handle.join().unwrap();
        }

        let stored = registry.get(&"A1".into()).unwrap();
        assert_eq!(stored.performance_history.len(), 200);
        assert_eq!(stored.current_workload, 100);
    }
}
