//! Change poller: incremental calendar fetch with cursor recovery

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use crosscal_domain::{CanonicalEvent, Config, Result, SyncError};
use tracing::{debug, warn};

use super::ports::{CalendarGateway, StateStore};

/// Poller tunables, derived from [`Config`].
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Window fetched when no cursor exists yet.
    pub initial_lookback: Duration,
    /// Rewind applied to the cursor before each incremental fetch, so
    /// near-boundary writes are not missed.
    pub safety_margin: Duration,
}

impl PollerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_lookback: Duration::days(config.sync.initial_lookback_days),
            safety_margin: Duration::minutes(config.sync.cursor_safety_margin_minutes),
        }
    }
}

/// One batch of changed events plus the cursor to persist once the batch
/// has been fully reconciled.
#[derive(Debug, Clone)]
pub struct PollBatch {
    pub events: Vec<CanonicalEvent>,
    pub next_cursor: DateTime<Utc>,
}

/// Fetches the set of calendar events changed since the saved cursor.
pub struct ChangePoller {
    calendar: Arc<dyn CalendarGateway>,
    state: Arc<dyn StateStore>,
    cfg: PollerConfig,
}

impl ChangePoller {
    pub fn new(
        calendar: Arc<dyn CalendarGateway>,
        state: Arc<dyn StateStore>,
        cfg: PollerConfig,
    ) -> Self {
        Self { calendar, state, cfg }
    }

    /// Fetch the change delta since the saved cursor.
    ///
    /// A rejected (expired) cursor degrades to an unbounded full listing:
    /// its result is equally valid reconciliation input, and cancelled
    /// events found that way still propagate as deletions. The caller is
    /// responsible for persisting `next_cursor` after the batch has been
    /// processed.
    pub async fn fetch_changes(&self) -> Result<PollBatch> {
        let cursor = self.state.cursor().await?;
        let updated_min = match cursor {
            Some(cursor) => cursor - self.cfg.safety_margin,
            None => Utc::now() - self.cfg.initial_lookback,
        };
        debug!(updated_min = %updated_min, "fetching calendar delta");

        let events = match self.calendar.list_changed_since(updated_min).await {
            Ok(events) => events,
            Err(SyncError::CursorExpired) => {
                warn!("sync cursor expired; falling back to full listing");
                self.calendar.list_all().await?
            }
            Err(err) => return Err(err),
        };

        let next_cursor =
            events.iter().filter_map(|event| event.updated).max().unwrap_or_else(Utc::now);
        Ok(PollBatch { events, next_cursor })
    }
}
