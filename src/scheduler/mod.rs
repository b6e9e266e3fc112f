//! Periodic refresh of market data.
//!
//! A [`RefreshScheduler`] runs a refresh cycle at a fixed interval until it is
//! shut down. Each cycle is spawned as its own task, so a slow cycle does not
//! delay the next tick and cycles may overlap.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Spawns refresh cycles on a fixed interval.
pub struct RefreshScheduler;

/// Handle to a running scheduler.
#[derive(Debug)]
pub struct RefreshHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Start calling `cycle` every `period`, first after one full period.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(period: Duration, mut cycle: F) -> RefreshHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = Arc::new(Notify::new());
        let stop = Arc::clone(&shutdown);

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!("Starting refresh scheduler (interval={}s)", period.as_secs());

            loop {
                tokio::select! {
                    _ = stop.notified() => {
                        tracing::info!("Refresh scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        tracing::debug!("Refresh cycle starting");
                        tokio::spawn(cycle());
                    }
                }
            }
        });

        RefreshHandle { shutdown, task }
    }
}

impl RefreshHandle {
    /// Stop scheduling new cycles and wait for the scheduler task to exit.
    ///
    /// Cycles already running are left to finish on their own.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();

        if let Err(e) = self.task.await {
            tracing::error!("Refresh scheduler task failed: {}", e);
        }
    }

    /// Whether the scheduler task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
