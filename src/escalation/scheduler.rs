//! Periodic sweep scheduling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::engine::{EscalationEngine, SweepReport};
use crate::error::StoreError;

/// Default time between sweeps.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Shortest accepted interval.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Runs the escalation sweep on a fixed interval.
///
/// At most one sweep runs per scheduler at a time: a tick or manual
/// trigger that arrives while a sweep is in flight is skipped. Sweeps from
/// other processes are tolerated by the notification log's unique key.
#[derive(Debug)]
pub struct SweepScheduler {
    engine: Arc<EscalationEngine>,
    interval: Duration,
    run_on_start: bool,
    running: Mutex<()>,
}

impl SweepScheduler {
    /// Creates a scheduler. Intervals under one second are raised to one
    /// second.
    #[must_use]
    pub fn new(engine: Arc<EscalationEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval: interval.max(MIN_INTERVAL),
            run_on_start: false,
            running: Mutex::new(()),
        }
    }

    /// Also sweeps immediately when [`run`](Self::run) starts.
    #[must_use]
    pub const fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    /// Configured interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one sweep now unless one is already in flight.
    ///
    /// Returns `Ok(None)` when skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the sweep could not list parcels.
    pub async fn trigger(&self) -> Result<Option<SweepReport>, StoreError> {
        let Ok(_guard) = self.running.try_lock() else {
            info!("escalation sweep already running, skipping");
            return Ok(None);
        };
        self.engine.run_once().await.map(Some)
    }

    /// Sweeps on every tick until `cancel` fires.
    ///
    /// Ticks missed while a long sweep runs are dropped, not replayed. A
    /// sweep in progress when `cancel` fires is allowed to finish.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !self.run_on_start {
            // The first tick completes immediately.
            ticker.tick().await;
        }
        info!(
            interval = %humantime::format_duration(self.interval),
            run_on_start = self.run_on_start,
            "escalation scheduler started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.trigger().await {
                        error!(error = %e, "escalation sweep could not run");
                    }
                }
            }
        }
        info!("escalation scheduler stopped");
    }
}
