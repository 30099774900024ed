//! ReconciliationScheduler - Background loop that drives reconciliation passes.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 300s | Time between pass starts |
//! | `run_on_start` | true | Run a pass immediately at startup |
//!
//! Passes never overlap: a pass that outlasts the interval delays the next
//! tick instead of queueing extra ones.
//!
//! ## Graceful Shutdown
//!
//! The loop listens for a shutdown signal and lets a running pass finish
//! before stopping.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::application::ReconciliationService;
use crate::domain::foundation::Timestamp;
use crate::domain::reconciliation::ReconciliationReport;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            run_on_start: true,
        }
    }
}

impl SchedulerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }
}

/// Periodically runs [`ReconciliationService::run_once`].
pub struct ReconciliationScheduler {
    service: Arc<ReconciliationService>,
    config: SchedulerConfig,
}

impl ReconciliationScheduler {
    pub fn new(service: Arc<ReconciliationService>, config: SchedulerConfig) -> Self {
        Self { service, config }
    }

    /// Run the scheduler loop until shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.config.run_on_start {
            // The first tick completes immediately
            interval.tick().await;
        }

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "Reconciliation scheduler started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Reconciliation scheduler stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Run exactly one pass.
    pub async fn tick(&self) -> ReconciliationReport {
        self.service.run_once(Timestamp::now()).await
    }
}
