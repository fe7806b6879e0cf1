//! Periodic reconciliation scheduler
//!
//! Runs one cycle immediately on start (honoring a force-renew request
//! from the command line), then repeats at a fixed interval forever. No
//! error escalates past this loop: a failed cycle is logged and retried
//! at the next tick. Crash recovery is the supervisor's job: every
//! mutating step is idempotent, so a fresh cycle after a restart
//! converges on the same state.

use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::error::CycleError;
use crate::reconcile::{CycleSummary, Reconciler};

/// Minimum cycle interval (1 minute)
const MIN_INTERVAL: Duration = Duration::from_secs(60);

/// Fixed-interval scheduler around the reconciliation loop
pub struct Scheduler {
    reconciler: Reconciler,
    cycle_interval: Duration,
}

impl Scheduler {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler,
            cycle_interval: Duration::from_secs(3600),
        }
    }

    /// Set the cycle interval, clamped to a minimum of one minute
    pub fn with_interval(mut self, cycle_interval: Duration) -> Self {
        self.cycle_interval = cycle_interval.max(MIN_INTERVAL);
        self
    }

    /// The effective cycle interval
    pub fn cycle_interval(&self) -> Duration {
        self.cycle_interval
    }

    /// Run a single reconciliation cycle
    pub async fn run_once(&self, force_renew: bool) -> Result<CycleSummary, CycleError> {
        self.reconciler.run_cycle(force_renew).await
    }

    /// Run the scheduler loop until SIGTERM or SIGINT
    ///
    /// `force_renew` applies to the first pass only. SIGHUP runs an
    /// immediate extra cycle without waiting for the next tick.
    pub async fn run(self, force_renew: bool) {
        info!(
            interval_secs = self.cycle_interval.as_secs(),
            force_renew, "Starting reconciliation scheduler"
        );

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
        let mut sighup = signal(SignalKind::hangup()).expect("failed to register SIGHUP handler");

        // tokio's interval fires immediately on the first tick, which
        // gives us the immediate startup pass.
        let mut ticker = interval(self.cycle_interval);
        let mut first = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("Running scheduled reconciliation cycle");
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, running an immediate cycle");
                    ticker.reset();
                }
                _ = sigterm.recv() => break,
                _ = sigint.recv() => break,
            }

            let force = force_renew && first;
            first = false;

            match self.reconciler.run_cycle(force).await {
                Ok(summary) if summary.proxy_down => {
                    // Expected during startup races; retried next tick
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Reconciliation cycle failed");
                }
            }
        }

        info!("Shutdown signal received, stopping");
    }
}
