//! Fixed-cadence driver for the transition engine

use super::{RunSummary, TransitionEngine};
use crate::shutdown::ShutdownCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Calls [`TransitionEngine::run_now`] every `period` until shutdown
pub struct Scheduler {
    engine: Arc<TransitionEngine>,
    period: Duration,
    shutdown: ShutdownCoordinator,
}

impl Scheduler {
    pub fn new(engine: Arc<TransitionEngine>, shutdown: ShutdownCoordinator) -> Self {
        let period = Duration::from_secs(engine.config().interval_secs.max(1));
        Self {
            engine,
            period,
            shutdown,
        }
    }

    /// Override the cadence
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Run until shutdown is requested; returns the number of completed runs
    ///
    /// The first run starts immediately. A run in progress when shutdown is
    /// requested is allowed to finish.
    pub async fn run(&self) -> usize {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut completed = 0;

        info!(period_secs = self.period.as_secs(), "Scheduler started");

        loop {
            tokio::select! {
                _ = self.shutdown.wait_for_shutdown() => break,
                _ = ticker.tick() => {}
            }
            if self.shutdown.is_shutdown_requested() {
                break;
            }

            let summary: RunSummary = self.engine.run_now().await;
            if summary.skipped_in_flight {
                continue;
            }
            completed += 1;
            if summary.has_failures() {
                warn!(
                    run_id = %summary.run_id,
                    failures = summary.failures.len(),
                    "Scheduled run finished with failures"
                );
            }
        }

        info!(completed_runs = completed, "Scheduler stopped");
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::db::Database;

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let engine = Arc::new(TransitionEngine::new(db, EngineConfig::default()));
        let shutdown = ShutdownCoordinator::new();
        let scheduler = Scheduler::new(engine, shutdown.clone()).with_period(Duration::from_millis(20));

        let handle = tokio::spawn(async move { scheduler.run().await });
        tokio::time::sleep(Duration::from_millis(70)).await;
        shutdown.request_shutdown();

        let completed = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(completed >= 1);
    }

    #[tokio::test]
    async fn test_scheduler_does_not_start_after_shutdown() {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let engine = Arc::new(TransitionEngine::new(db, EngineConfig::default()));
        let shutdown = ShutdownCoordinator::new();
        shutdown.request_shutdown();

        let completed = Scheduler::new(engine, shutdown).run().await;
        assert_eq!(completed, 0);
    }
}
