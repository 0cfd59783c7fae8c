//! Inbound direction: chat-platform event callbacks mirrored into the
//! calendar and document stores
//!
//! Structurally the same resolve-then-upsert flow as the calendar-origin
//! reconciler, run per individual callback. Every handler first applies the
//! origin filter: events created by the synchronisation bot itself are
//! echoes of a prior calendar->chat mirror and must not be reflected back.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use crosscal_domain::{
    CalendarEventDraft, ChatScheduledEvent, Config, DocDatabase, DocPage, DocPageDraft,
    DocPagePatch, MirrorScope, Result, SyncError,
};
use tracing::{error, info, warn};

use super::ports::{CalendarGateway, DocumentGateway, StateStore};

/// Inbound-direction behaviour switches, derived from [`Config`].
#[derive(Debug, Clone)]
pub struct InboundConfig {
    /// The synchronisation bot's own chat identity.
    pub bot_user_id: String,
    /// Events whose title contains this keyword stay out of the external
    /// mirror database.
    pub exclude_keyword: Option<String>,
    pub external_enabled: bool,
}

impl InboundConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bot_user_id: config.chat.bot_user_id.clone(),
            exclude_keyword: config.sync.exclude_keyword.clone(),
            external_enabled: config.docs.external_db_id.is_some(),
        }
    }
}

/// Handles chat-platform scheduled-event callbacks.
pub struct InboundSync {
    calendar: Arc<dyn CalendarGateway>,
    docs: Arc<dyn DocumentGateway>,
    state: Arc<dyn StateStore>,
    cfg: InboundConfig,
}

impl InboundSync {
    pub fn new(
        calendar: Arc<dyn CalendarGateway>,
        docs: Arc<dyn DocumentGateway>,
        state: Arc<dyn StateStore>,
        cfg: InboundConfig,
    ) -> Self {
        Self { calendar, docs, state, cfg }
    }

    fn is_self_originated(&self, event: &ChatScheduledEvent) -> bool {
        event.creator_id == self.cfg.bot_user_id
    }

    fn is_excluded(&self, title: &str) -> bool {
        self.cfg.exclude_keyword.as_deref().is_some_and(|keyword| title.contains(keyword))
    }

    /// A human created a scheduled event in the chat platform.
    pub async fn event_created(&self, event: &ChatScheduledEvent) -> Result<()> {
        if self.is_self_originated(event) {
            info!(chat_event_id = %event.id, name = %event.name,
                "skipping bot-created chat event");
            return Ok(());
        }
        let Some(start) = event.start else {
            warn!(chat_event_id = %event.id, "dropping chat event without start time");
            return Ok(());
        };
        let end = effective_end(start, event.end);

        // The calendar mirror is best-effort: a calendar outage must not
        // prevent the document mirrors from being written.
        let calendar_id = match self.calendar.create_event(&calendar_draft(event, start, end)).await
        {
            Ok(id) => {
                info!(chat_event_id = %event.id, calendar_event_id = %id,
                    "calendar event created from chat event");
                self.state.set_mirror_id(&id, MirrorScope::ChatEvent, &event.id).await?;
                Some(id)
            }
            Err(err) => {
                error!(chat_event_id = %event.id, error = %err,
                    "calendar create failed; continuing with doc mirrors");
                None
            }
        };

        let internal_id = self
            .docs
            .create_page(DocDatabase::Internal, &doc_draft(event, start, end, &calendar_id, true))
            .await?;
        if let Some(calendar_id) = &calendar_id {
            self.state.set_mirror_id(calendar_id, MirrorScope::DocInternal, &internal_id).await?;
        }

        if self.cfg.external_enabled {
            if self.is_excluded(&event.name) {
                warn!(chat_event_id = %event.id, name = %event.name,
                    "excluded title; external mirror not created");
            } else {
                let external_id = self
                    .docs
                    .create_page(
                        DocDatabase::External,
                        &doc_draft(event, start, end, &calendar_id, false),
                    )
                    .await?;
                if let Some(calendar_id) = &calendar_id {
                    self.state
                        .set_mirror_id(calendar_id, MirrorScope::DocExternal, &external_id)
                        .await?;
                }
            }
        }

        info!(chat_event_id = %event.id, name = %event.name, "chat event mirrored");
        Ok(())
    }

    /// A human edited a scheduled event in the chat platform.
    pub async fn event_updated(&self, event: &ChatScheduledEvent) -> Result<()> {
        if self.is_self_originated(event) {
            info!(chat_event_id = %event.id, "skipping bot-created chat event update");
            return Ok(());
        }
        let Some(start) = event.start else {
            warn!(chat_event_id = %event.id, "dropping chat event update without start time");
            return Ok(());
        };
        let end = effective_end(start, event.end);

        let internal = self.docs.find_by_reference(DocDatabase::Internal, &event.id).await?;
        let calendar_id = self.resolve_calendar_id(event, internal.as_ref()).await?;

        match &calendar_id {
            Some(calendar_id) => {
                match self.calendar.update_event(calendar_id, &calendar_draft(event, start, end)).await
                {
                    Ok(()) => info!(chat_event_id = %event.id, calendar_event_id = %calendar_id,
                        "calendar event updated from chat event"),
                    Err(SyncError::NotFound(_)) => warn!(calendar_event_id = %calendar_id,
                        "calendar mirror missing; nothing to update"),
                    Err(err) => error!(calendar_event_id = %calendar_id, error = %err,
                        "calendar update failed"),
                }
            }
            None => warn!(chat_event_id = %event.id,
                "calendar update skipped: mirror id unresolved"),
        }

        match &internal {
            Some(page) => {
                self.docs.update_page(&page.id, &doc_patch(event, start, end, true)).await?;
            }
            None => warn!(chat_event_id = %event.id, "no internal doc mirror to update"),
        }

        if self.cfg.external_enabled && !self.is_excluded(&event.name) {
            match self.docs.find_by_reference(DocDatabase::External, &event.id).await? {
                Some(page) => {
                    self.docs.update_page(&page.id, &doc_patch(event, start, end, false)).await?;
                }
                None => warn!(chat_event_id = %event.id, "no external doc mirror to update"),
            }
        }

        Ok(())
    }

    /// A human deleted a scheduled event in the chat platform.
    pub async fn event_deleted(&self, event: &ChatScheduledEvent) -> Result<()> {
        if self.is_self_originated(event) {
            info!(chat_event_id = %event.id, "skipping bot-created chat event deletion");
            return Ok(());
        }

        let internal = self.docs.find_by_reference(DocDatabase::Internal, &event.id).await?;
        let calendar_id = self.resolve_calendar_id(event, internal.as_ref()).await?;

        match &calendar_id {
            Some(calendar_id) => match self.calendar.delete_event(calendar_id).await {
                Ok(()) => info!(chat_event_id = %event.id, calendar_event_id = %calendar_id,
                    "calendar event deleted from chat event"),
                Err(SyncError::NotFound(_)) => warn!(calendar_event_id = %calendar_id,
                    "calendar mirror already gone"),
                Err(err) => error!(calendar_event_id = %calendar_id, error = %err,
                    "calendar delete failed"),
            },
            None => warn!(chat_event_id = %event.id,
                "calendar delete skipped: mirror id unresolved"),
        }

        if let Some(page) = &internal {
            self.docs.archive_page(&page.id).await?;
            info!(chat_event_id = %event.id, page_id = %page.id, "internal doc mirror archived");
        }

        if self.cfg.external_enabled && !self.is_excluded(&event.name) {
            match self.docs.find_by_reference(DocDatabase::External, &event.id).await? {
                Some(page) => {
                    self.docs.archive_page(&page.id).await?;
                    info!(chat_event_id = %event.id, page_id = %page.id,
                        "external doc mirror archived");
                }
                None => warn!(chat_event_id = %event.id, "no external doc mirror to archive"),
            }
        }

        if let Some(calendar_id) = &calendar_id {
            for scope in
                [MirrorScope::ChatEvent, MirrorScope::DocInternal, MirrorScope::DocExternal]
            {
                self.state.remove_mirror_id(calendar_id, scope).await?;
            }
        }

        Ok(())
    }

    /// Calendar identity for a chat event: reverse id map first, then the
    /// calendar-id column of the internal doc mirror.
    async fn resolve_calendar_id(
        &self,
        event: &ChatScheduledEvent,
        internal: Option<&DocPage>,
    ) -> Result<Option<String>> {
        if let Some(id) = self.state.calendar_id_for_chat_event(&event.id).await? {
            return Ok(Some(id));
        }
        Ok(internal.and_then(|page| page.calendar_event_id.clone()))
    }
}

fn effective_end(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match end {
        Some(end) if end > start => end,
        _ => start + Duration::hours(1),
    }
}

fn calendar_draft(
    event: &ChatScheduledEvent,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> CalendarEventDraft {
    CalendarEventDraft {
        title: event.name.clone(),
        description: event.description.clone().unwrap_or_default(),
        start,
        end,
        location: event.location.clone(),
    }
}

fn doc_draft(
    event: &ChatScheduledEvent,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    calendar_id: &Option<String>,
    internal: bool,
) -> DocPageDraft {
    DocPageDraft {
        title: event.name.clone(),
        body: event.description.clone().unwrap_or_default(),
        start,
        end: Some(end),
        creator: event.creator_id.clone(),
        reference_id: Some(event.id.clone()),
        calendar_event_id: calendar_id.clone(),
        event_url: if internal { event.url.clone() } else { None },
        location: if internal { event.location.clone() } else { None },
    }
}

fn doc_patch(
    event: &ChatScheduledEvent,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    internal: bool,
) -> DocPagePatch {
    DocPagePatch {
        title: Some(event.name.clone()),
        body: Some(event.description.clone().unwrap_or_default()),
        start: Some(start),
        end: Some(end),
        reference_id: None,
        calendar_event_id: None,
        event_url: if internal { event.url.clone() } else { None },
        location: if internal { event.location.clone() } else { None },
    }
}
