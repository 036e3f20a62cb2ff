//! Periodic driver for reconciliation cycles.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::reconciler::Reconciler;

/// Runs a cycle every `interval`. The next cycle never starts before the
/// previous one has finished; ticks missed while a cycle runs are dropped.
pub struct CycleScheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl CycleScheduler {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Loops until `shutdown` is cancelled and returns the number of cycles
    /// that completed; skipped cycles are not counted. Cancellation is only
    /// observed between cycles, so an in-flight cycle always finishes.
    pub async fn run(self, shutdown: CancellationToken) -> u64 {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut completed = 0;
        let mut skipped = 0u64;

        info!(interval = ?self.interval, "scheduler started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = self.reconciler.run_cycle().await;
            if report.is_skipped() {
                skipped += 1;
                warn!(cycle = report.cycle, "cycle skipped");
            } else {
                completed += 1;
            }
        }
        info!(completed, skipped, "scheduler stopped");
        completed
    }

    pub fn spawn(self) -> SchedulerHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(token.clone()));
        SchedulerHandle { token, task }
    }
}

pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<u64>,
}

impl SchedulerHandle {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stops scheduling and waits for the in-flight cycle, if any.
    pub async fn shutdown(self) -> Result<u64> {
        self.token.cancel();
        self.task.await.context("scheduler task failed")
    }
}
