//! Background schedulers
//!
//! Two independent fixed-interval loops: the periodic poll trigger (which
//! shares the run coordinator with the webhook, so overlap collapses into
//! a single pass) and the retention sweep. Both stop gracefully through a
//! shared cancellation token.

use std::sync::Arc;
use std::time::Duration;

use crosscal_domain::Config;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::AppContext;

/// Configuration for the background scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub sweep_interval: Duration,
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.sync.poll_interval_seconds),
            sweep_interval: Duration::from_secs(config.sync.sweep_interval_seconds),
        }
    }
}

/// Periodic poll and retention-sweep driver with lifecycle management.
pub struct BackgroundScheduler {
    ctx: Arc<AppContext>,
    config: SchedulerConfig,
    cancellation_token: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundScheduler {
    pub fn new(ctx: Arc<AppContext>, config: SchedulerConfig) -> Self {
        Self { ctx, config, cancellation_token: CancellationToken::new(), handles: Mutex::new(Vec::new()) }
    }

    /// Start both loops.
    ///
    /// # Errors
    /// Returns an error if the scheduler is already running.
    pub async fn start(&mut self) -> Result<(), String> {
        if self.is_running().await {
            return Err("scheduler already running".to_string());
        }

        info!("starting background scheduler");

        // A fresh token supports restart after stop.
        self.cancellation_token = CancellationToken::new();
        let mut handles = self.handles.lock().await;

        {
            let ctx = Arc::clone(&self.ctx);
            let interval = self.config.poll_interval;
            let cancel = self.cancellation_token.clone();
            handles.push(tokio::spawn(async move {
                Self::poll_loop(ctx, interval, cancel).await;
            }));
        }
        {
            let ctx = Arc::clone(&self.ctx);
            let interval = self.config.sweep_interval;
            let cancel = self.cancellation_token.clone();
            handles.push(tokio::spawn(async move {
                Self::sweep_loop(ctx, interval, cancel).await;
            }));
        }

        info!("background scheduler started");
        Ok(())
    }

    /// Stop both loops gracefully.
    ///
    /// # Errors
    /// Returns an error if the scheduler is not running or a task fails to
    /// finish within the join timeout.
    pub async fn stop(&mut self) -> Result<(), String> {
        if !self.is_running().await {
            return Err("scheduler not running".to_string());
        }

        info!("stopping background scheduler");
        self.cancellation_token.cancel();

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("scheduler task panicked: {}", e);
                    return Err("scheduler task panicked".to_string());
                }
                Err(_) => {
                    warn!("scheduler task did not complete within timeout");
                    return Err("scheduler task timeout".to_string());
                }
            }
        }

        info!("background scheduler stopped");
        Ok(())
    }

    /// Check whether the scheduler has active tasks.
    pub async fn is_running(&self) -> bool {
        !self.handles.lock().await.is_empty()
    }

    async fn poll_loop(ctx: Arc<AppContext>, interval: Duration, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("poll loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match ctx.run_sync("scheduler").await {
                        Ok(outcome) if outcome.was_skipped() => {
                            debug!("periodic poll skipped by coordinator");
                        }
                        Ok(_) => debug!("periodic poll completed"),
                        Err(err) => warn!(error = %err, "periodic poll failed"),
                    }
                }
            }
        }
    }

    async fn sweep_loop(ctx: Arc<AppContext>, interval: Duration, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("sweep loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match ctx.sweeper.sweep().await {
                        Ok(summary) => debug!(archived = summary.archived, "retention sweep completed"),
                        Err(err) => warn!(error = %err, "retention sweep failed"),
                    }
                }
            }
        }
    }
}

/// Ensure the loops are cancelled when dropped.
impl Drop for BackgroundScheduler {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            self.cancellation_token.cancel();
        }
    }
}
