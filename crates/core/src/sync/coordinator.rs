//! Run coordinator: single-flight plus cooldown for reconciliation passes
//!
//! Webhook-triggered, scheduler-triggered and manually-triggered passes all
//! share one coordinator. A trigger arriving while a pass runs is dropped,
//! not queued; a trigger inside the cooldown window is dropped as well, so
//! bursts of near-simultaneous notifications collapse into a single pass.

use std::future::Future;
use std::time::{Duration, Instant};

use crosscal_domain::Result;
use tracing::info;

use super::service::PassSummary;

/// Outcome of a coordinated run attempt.
#[derive(Debug, Clone, Copy)]
pub enum RunOutcome {
    /// A pass actually ran to completion.
    Completed(PassSummary),
    /// Dropped: the previous pass started too recently.
    SkippedCooldown,
    /// Dropped: another pass is currently in flight.
    SkippedBusy,
}

impl RunOutcome {
    pub fn was_skipped(&self) -> bool {
        !matches!(self, RunOutcome::Completed(_))
    }
}

/// Serialises reconciliation passes and throttles trigger bursts.
pub struct RunCoordinator {
    gate: tokio::sync::Mutex<()>,
    cooldown: Duration,
    last_started: parking_lot::Mutex<Option<Instant>>,
}

impl RunCoordinator {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            gate: tokio::sync::Mutex::new(()),
            cooldown,
            last_started: parking_lot::Mutex::new(None),
        }
    }

    /// Run `pass` unless another pass is in flight or the cooldown window
    /// is still open. The gate is released on every exit path, including
    /// pass failure.
    pub async fn run_pass<F, Fut>(&self, source: &str, pass: F) -> Result<RunOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PassSummary>>,
    {
        if let Some(last) = *self.last_started.lock() {
            if last.elapsed() < self.cooldown {
                info!(source, "sync skipped: cooldown window active");
                return Ok(RunOutcome::SkippedCooldown);
            }
        }

        let Ok(_guard) = self.gate.try_lock() else {
            info!(source, "sync skipped: another pass in progress");
            return Ok(RunOutcome::SkippedBusy);
        };
        *self.last_started.lock() = Some(Instant::now());

        let summary = pass().await?;
        Ok(RunOutcome::Completed(summary))
    }
}
