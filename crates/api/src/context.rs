//! Application context: construction point for all process-wide state
//!
//! Every shared component is built here once and injected explicitly; no
//! module holds ambient globals, so tests can assemble a context from
//! in-memory gateways.

use std::sync::Arc;
use std::time::Duration;

use crosscal_core::{
    CalendarGateway, ChangePoller, ChatGateway, DocumentGateway, InboundConfig, InboundSync,
    PollerConfig, Reconciler, ReconcilerConfig, RetentionSweeper, RunCoordinator, RunOutcome,
    StateStore, SyncService,
};
use crosscal_domain::{Config, Result};
use crosscal_infra::{DiscordClient, FileStateStore, GoogleCalendarClient, NotionClient};

/// Shared application state behind the HTTP surface and the schedulers.
pub struct AppContext {
    pub config: Config,
    pub state: Arc<dyn StateStore>,
    pub coordinator: RunCoordinator,
    pub sync: Arc<SyncService>,
    pub inbound: InboundSync,
    pub sweeper: RetentionSweeper,
}

impl AppContext {
    /// Build the production context: file-backed state plus the real
    /// gateway clients.
    pub fn from_config(config: Config) -> Result<Self> {
        let state: Arc<dyn StateStore> = Arc::new(FileStateStore::open(
            &config.sync.state_dir,
            config.sync.dedup_capacity,
        )?);
        let calendar: Arc<dyn CalendarGateway> =
            Arc::new(GoogleCalendarClient::new(&config.calendar)?);
        let docs: Arc<dyn DocumentGateway> = Arc::new(NotionClient::new(&config.docs)?);
        let chat: Arc<dyn ChatGateway> = Arc::new(DiscordClient::new(&config.chat)?);
        Ok(Self::assemble(config, state, calendar, docs, chat))
    }

    /// Wire the services from already-constructed collaborators. Used
    /// directly by tests with in-memory gateways.
    pub fn assemble(
        config: Config,
        state: Arc<dyn StateStore>,
        calendar: Arc<dyn CalendarGateway>,
        docs: Arc<dyn DocumentGateway>,
        chat: Arc<dyn ChatGateway>,
    ) -> Self {
        let poller =
            ChangePoller::new(calendar.clone(), state.clone(), PollerConfig::from_config(&config));
        let reconciler = Arc::new(Reconciler::new(
            state.clone(),
            docs.clone(),
            chat,
            ReconcilerConfig::from_config(&config),
        ));
        let sync = Arc::new(SyncService::new(poller, reconciler, state.clone()));
        let inbound = InboundSync::new(
            calendar,
            docs.clone(),
            state.clone(),
            InboundConfig::from_config(&config),
        );
        let sweeper = RetentionSweeper::new(docs, &config);
        let coordinator = RunCoordinator::new(Duration::from_secs(config.sync.cooldown_seconds));

        Self { config, state, coordinator, sync, inbound, sweeper }
    }

    /// Run one coordinated calendar-origin reconciliation pass.
    pub async fn run_sync(&self, source: &str) -> Result<RunOutcome> {
        let sync = Arc::clone(&self.sync);
        self.coordinator.run_pass(source, move || async move { sync.run_pass().await }).await
    }
}
