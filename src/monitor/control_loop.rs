//! The agent's main loop.
//!
//! # Responsibilities
//! - Run one detection cycle at startup, then one per interval
//! - Invoke the shutdown chain when the trigger is detected
//! - Stop on the termination signal, cancelling the shared context

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::lifecycle::signals::TerminationSignal;
use crate::observability::metrics;
use crate::shutdown::ShutdownOrchestrator;
use crate::trigger::SignalWatcher;

/// What a single detection cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Key absent; nothing to do.
    Idle,
    /// The store could not be checked this time.
    DetectionFailed,
    /// Trigger consumed and a shutdown method accepted the request.
    ShutdownInitiated { method: String },
    /// Trigger consumed but every shutdown method failed.
    ShutdownFailed,
}

impl CycleOutcome {
    fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Idle => "idle",
            CycleOutcome::DetectionFailed => "detection_failed",
            CycleOutcome::ShutdownInitiated { .. } => "shutdown_initiated",
            CycleOutcome::ShutdownFailed => "shutdown_failed",
        }
    }
}

/// Totals reported when the loop exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    pub shutdowns_initiated: u64,
    pub shutdowns_failed: u64,
    /// The signal that ended the loop, if one was delivered.
    pub signal: Option<TerminationSignal>,
}

impl LoopSummary {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::ShutdownInitiated { .. } => self.shutdowns_initiated += 1,
            CycleOutcome::ShutdownFailed => self.shutdowns_failed += 1,
            CycleOutcome::Idle | CycleOutcome::DetectionFailed => {}
        }
    }
}

/// Drives detection and shutdown from a single point of control.
///
/// Timer ticks and the termination signal share one `select!`, so at most
/// one cycle (and therefore one orchestration run) is active at a time.
pub struct ControlLoop {
    watcher: SignalWatcher,
    orchestrator: ShutdownOrchestrator,
    interval: Duration,
    context: CancellationToken,
}

impl ControlLoop {
    pub fn new(
        watcher: SignalWatcher,
        orchestrator: ShutdownOrchestrator,
        interval: Duration,
    ) -> Self {
        Self {
            watcher,
            orchestrator,
            interval,
            context: CancellationToken::new(),
        }
    }

    /// Context handed to shutdown methods; cancelled when the loop stops.
    pub fn context(&self) -> CancellationToken {
        self.context.clone()
    }

    /// Run until a termination signal arrives.
    ///
    /// A cycle already in progress is finished before the signal is seen;
    /// an external command that has been spawned is never interrupted.
    pub async fn run(self, mut shutdown: broadcast::Receiver<TerminationSignal>) -> LoopSummary {
        tracing::info!(
            key = %self.watcher.key(),
            interval_secs = self.interval.as_secs(),
            methods = ?self.orchestrator.method_names(),
            "Starting Redis key monitoring"
        );

        let mut summary = LoopSummary::default();

        let outcome = self.run_cycle().await;
        summary.record(&outcome);

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                received = shutdown.recv() => {
                    // A closed or lagged channel still means "stop".
                    summary.signal = received.ok();
                    match summary.signal {
                        Some(signal) => {
                            tracing::info!(signal = %signal, "Received shutdown signal")
                        }
                        None => tracing::info!("Termination coordinator closed"),
                    }
                    self.context.cancel();
                    break;
                }
                _ = ticker.tick() => {
                    let outcome = self.run_cycle().await;
                    summary.record(&outcome);
                }
            }
        }

        tracing::info!(
            cycles = summary.cycles,
            shutdowns_initiated = summary.shutdowns_initiated,
            shutdowns_failed = summary.shutdowns_failed,
            "Graceful shutdown complete"
        );
        summary
    }

    /// One detection cycle. Errors are logged here and never escape.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let outcome = self.detect_and_act().await;
        metrics::record_cycle(outcome.label());
        outcome
    }

    async fn detect_and_act(&self) -> CycleOutcome {
        match self.watcher.check(&self.context).await {
            Err(e) => {
                tracing::error!(error = %e, "Error checking Redis key");
                return CycleOutcome::DetectionFailed;
            }
            Ok(false) => {
                tracing::debug!("Redis key not found, continuing to monitor...");
                return CycleOutcome::Idle;
            }
            Ok(true) => {
                tracing::info!(
                    key = %self.watcher.key(),
                    "Shutdown signal received! Key found and deleted."
                );
            }
        }

        match self.orchestrator.execute(&self.context).await {
            Ok(report) => {
                tracing::info!(
                    method = %report.method,
                    attempts = report.attempts.len(),
                    "Host shutdown initiated successfully"
                );
                CycleOutcome::ShutdownInitiated { method: report.method }
            }
            Err(e) => {
                // The trigger is already consumed; a new one is needed to retry.
                tracing::error!(
                    error = %e,
                    attempts = e.attempts().len(),
                    "Failed to initiate host shutdown"
                );
                CycleOutcome::ShutdownFailed
            }
        }
    }
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("watcher", &self.watcher)
            .field("orchestrator", &self.orchestrator)
            .field("interval", &self.interval)
            .finish()
    }
}
