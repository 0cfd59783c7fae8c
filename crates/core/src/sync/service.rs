//! Pass orchestration: poll the delta, reconcile each event, advance the
//! cursor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crosscal_domain::Result;
use tracing::{error, info};

use super::poller::ChangePoller;
use super::ports::StateStore;
use super::reconciler::Reconciler;

/// Outcome of one completed reconciliation pass.
#[derive(Debug, Clone, Copy)]
pub struct PassSummary {
    pub fetched: usize,
    pub failed: usize,
    pub next_cursor: DateTime<Utc>,
}

impl PassSummary {
    /// Whether every fetched event reconciled without error.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Runs one full calendar-origin reconciliation pass.
pub struct SyncService {
    poller: ChangePoller,
    reconciler: Arc<Reconciler>,
    state: Arc<dyn StateStore>,
}

impl SyncService {
    pub fn new(
        poller: ChangePoller,
        reconciler: Arc<Reconciler>,
        state: Arc<dyn StateStore>,
    ) -> Self {
        Self { poller, reconciler, state }
    }

    /// Fetch the delta and reconcile every event in it.
    ///
    /// A failure of the listing call aborts the pass; any single event's
    /// failure is logged and the pass continues. The cursor is persisted
    /// only after the whole batch has been attempted, so a crashed pass is
    /// simply replayed.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let batch = self.poller.fetch_changes().await?;
        let fetched = batch.events.len();
        info!(events = fetched, "reconciliation pass started");

        let mut failed = 0;
        for event in &batch.events {
            if let Err(err) = self.reconciler.apply(event).await {
                failed += 1;
                error!(
                    calendar_event_id = %event.calendar_id,
                    error = %err,
                    error_kind = err.label(),
                    "event reconciliation failed; continuing with next event"
                );
            }
        }

        self.state.set_cursor(batch.next_cursor).await?;
        info!(
            events = fetched,
            failed,
            next_cursor = %batch.next_cursor,
            "reconciliation pass completed"
        );
        Ok(PassSummary { fetched, failed, next_cursor: batch.next_cursor })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use crosscal_domain::{DocDatabase, SyncError};

    use super::*;
    use crate::sync::poller::PollerConfig;
    use crate::sync::reconciler::ReconcilerConfig;
    use crate::sync::support::{
        sample_event, MockCalendarGateway, MockChatGateway, MockDocumentGateway, MockStateStore,
    };

    struct Fixture {
        calendar: Arc<MockCalendarGateway>,
        docs: Arc<MockDocumentGateway>,
        state: Arc<MockStateStore>,
        service: SyncService,
    }

    fn fixture() -> Fixture {
        let calendar = Arc::new(MockCalendarGateway::default());
        let docs = Arc::new(MockDocumentGateway::default());
        let chat = Arc::new(MockChatGateway::default());
        let state = Arc::new(MockStateStore::default());
        let poller = ChangePoller::new(
            calendar.clone(),
            state.clone(),
            PollerConfig {
                initial_lookback: Duration::days(30),
                safety_margin: Duration::minutes(2),
            },
        );
        let reconciler = Arc::new(Reconciler::new(
            state.clone(),
            docs.clone(),
            chat,
            ReconcilerConfig {
                external_enabled: false,
                chat_enabled: true,
                marker_scan_enabled: false,
                name_limit: 100,
                description_limit: 1000,
                location_limit: 100,
                location_fallback: "Calendar".into(),
            },
        ));
        let service = SyncService::new(poller, reconciler, state.clone());
        Fixture { calendar, docs, state, service }
    }

    #[tokio::test]
    async fn pass_reconciles_batch_and_persists_cursor() {
        let f = fixture();
        let updated = Utc::now() - Duration::minutes(5);
        let mut event = sample_event("cal-1", Utc::now() + Duration::hours(2));
        event.updated = Some(updated);
        f.calendar.push_changed_result(Ok(vec![event]));

        let summary = f.service.run_pass().await.unwrap();

        assert_eq!(summary.fetched, 1);
        assert!(summary.is_clean());
        assert_eq!(f.docs.create_count(DocDatabase::Internal), 1);
        assert_eq!(f.state.stored_cursor(), Some(updated));
    }

    #[tokio::test]
    async fn listing_failure_aborts_pass_without_moving_cursor() {
        let f = fixture();
        let old_cursor = Utc::now() - Duration::hours(5);
        f.state.seed_cursor(old_cursor);
        f.calendar.push_changed_result(Err(SyncError::Network("listing down".into())));

        let result = f.service.run_pass().await;

        assert!(matches!(result, Err(SyncError::Network(_))));
        assert_eq!(f.state.stored_cursor(), Some(old_cursor));
    }
}
