//! Background scheduler for assignment passes, expiry sweeps, and
//! recalibration.

use std::sync::Arc;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::service::AnnotationService;

/// Runs the service's periodic work on a tokio task.
pub struct Scheduler {
    service: Arc<AnnotationService>,
    config: SchedulerConfig,
    /// Handle to the loop task.
    handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    started: bool,
}

impl Scheduler {
    pub fn new(service: Arc<AnnotationService>, config: SchedulerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            service,
            config,
            handle: None,
            shutdown_tx,
            shutdown_rx,
            started: false,
        }
    }

    /// Spawns the scheduling loop.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted);
        }

        info!(
            assignment_secs = self.config.assignment_interval_secs,
            expiry_secs = self.config.expiry_interval_secs,
            recalibration_secs = self.config.recalibration_interval_secs,
            "Starting scheduler"
        );

        let worker = SchedulerLoop {
            service: Arc::clone(&self.service),
            triggers: self.service.triggers(),
            config: self.config.clone(),
            shutdown: self.shutdown_rx.clone(),
        };
        self.handle = Some(tokio::spawn(worker.run()));
        self.started = true;

        Ok(())
    }

    /// Stops the loop and waits for in-flight work to finish.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if !self.started {
            return Err(SchedulerError::NotStarted);
        }

        info!("Shutting down scheduler");

        self.shutdown_tx.send(true).map_err(|e| {
            SchedulerError::Shutdown(format!("failed to send shutdown signal: {}", e))
        })?;

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .map_err(|e| SchedulerError::Shutdown(format!("scheduler task panicked: {}", e)))?;
        }

        self.started = false;
        debug!("Scheduler stopped");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn service(&self) -> Arc<AnnotationService> {
        Arc::clone(&self.service)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.started {
            let _ = self.shutdown_tx.send(true);
        }
    }
}

struct SchedulerLoop {
    service: Arc<AnnotationService>,
    triggers: Arc<Notify>,
    config: SchedulerConfig,
    shutdown: watch::Receiver<bool>,
}

impl SchedulerLoop {
    async fn run(mut self) {
        let mut assignment = interval(self.config.assignment_interval());
        let mut expiry = interval(self.config.expiry_interval());
        let recalibration_period = self.config.recalibration_interval();
        let mut recalibration = interval_at(Instant::now() + recalibration_period, recalibration_period);
        for ticker in [&mut assignment, &mut expiry, &mut recalibration] {
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        debug!("Scheduler received shutdown signal");
                        break;
                    }
                }
                _ = expiry.tick() => self.sweep(),
                _ = assignment.tick() => self.assign().await,
                _ = self.triggers.notified() => {
                    self.assign().await;
                    match self.service.feedback().recalibration_due() {
                        Ok(true) => self.recalibrate().await,
                        Ok(false) => {}
                        Err(e) => warn!(error = %e, "Recalibration check failed"),
                    }
                }
                _ = recalibration.tick() => {
                    match self.service.feedback().records_since_recalibration() {
                        Ok(0) => {}
                        Ok(_) => self.recalibrate().await,
                        Err(e) => warn!(error = %e, "Recalibration check failed"),
                    }
                }
            }
        }
    }

    /// Runs one pass on the blocking pool; the optimizer is CPU-bound.
    async fn assign(&self) {
        let service = Arc::clone(&self.service);
        match tokio::task::spawn_blocking(move || service.run_assignment_pass()).await {
            Ok(Ok(report)) if !report.assignments.is_empty() || report.conflicts > 0 => {
                debug!(
                    assigned = report.assignments.len(),
                    unmatched = report.unmatched.len(),
                    conflicts = report.conflicts,
                    "Scheduled assignment pass"
                );
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "Assignment pass failed"),
            Err(e) => warn!(error = %e, "Assignment task panicked"),
        }
    }

    fn sweep(&self) {
        if let Err(e) = self.service.sweep_expired(chrono::Utc::now()) {
            warn!(error = %e, "Expiry sweep failed");
        }
    }

    async fn recalibrate(&self) {
        let service = Arc::clone(&self.service);
        match tokio::task::spawn_blocking(move || service.recalibrate()).await {
            Ok(Ok(Some(summary))) => info!(
                generation = summary.generation,
                samples = summary.samples,
                "Scheduled recalibration complete"
            ),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => warn!(error = %e, "Recalibration failed"),
            Err(e) => warn!(error = %e, "Recalibration task panicked"),
        }
    }
}
