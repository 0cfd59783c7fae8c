//! Reconciler: applies one changed calendar event to the other two stores
//!
//! Resolution order for every mirror is correlation map first, direct query
//! second; whatever is rediscovered is persisted back so the next pass hits
//! the map. All writes are idempotent: replaying an unchanged event patches
//! mirrors with identical content and creates nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crosscal_domain::constants::origin_marker;
use crosscal_domain::{
    clip_chars, CanonicalEvent, ChatEventDraft, Config, DocDatabase, DocPage, DocPageDraft,
    DocPagePatch, MirrorScope, Result, SyncError,
};
use tracing::{debug, info, warn};

use super::ports::{ChatGateway, DocumentGateway, StateStore};

/// Reconciler behaviour switches, derived from [`Config`].
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Whether an external mirror database is configured.
    pub external_enabled: bool,
    /// Whether the chat platform is synchronised at all.
    pub chat_enabled: bool,
    /// Capability gate for the marker-scan identity fallback.
    pub marker_scan_enabled: bool,
    pub name_limit: usize,
    pub description_limit: usize,
    pub location_limit: usize,
    pub location_fallback: String,
}

impl ReconcilerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            external_enabled: config.docs.external_db_id.is_some(),
            chat_enabled: config.chat.enabled,
            marker_scan_enabled: config.chat.append_origin_marker,
            name_limit: config.chat.name_limit,
            description_limit: config.chat.description_limit,
            location_limit: config.chat.location_limit,
            location_fallback: config.chat.location_fallback.clone(),
        }
    }
}

/// Applies changed calendar events to the document store and chat platform.
pub struct Reconciler {
    state: Arc<dyn StateStore>,
    docs: Arc<dyn DocumentGateway>,
    chat: Arc<dyn ChatGateway>,
    cfg: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        state: Arc<dyn StateStore>,
        docs: Arc<dyn DocumentGateway>,
        chat: Arc<dyn ChatGateway>,
        cfg: ReconcilerConfig,
    ) -> Self {
        Self { state, docs, chat, cfg }
    }

    /// Reconcile a single canonical event against all mirrors.
    ///
    /// Malformed events (active without a start time) are dropped with a
    /// warning; they are not failures and will not be retried.
    pub async fn apply(&self, event: &CanonicalEvent) -> Result<()> {
        let internal = self.resolve_doc_page(event, DocDatabase::Internal).await?;
        let external = if self.cfg.external_enabled {
            self.resolve_doc_page(event, DocDatabase::External).await?
        } else {
            None
        };

        if event.is_cancelled() {
            return self.cancel(event, internal.as_ref(), external.as_ref()).await;
        }

        let Some(start) = event.start else {
            warn!(
                calendar_event_id = %event.calendar_id,
                "dropping active event without start time"
            );
            return Ok(());
        };
        let end = event.end_or_default().unwrap_or(start);
        // Events that ended before the bot ever saw them are not resurrected.
        let finished = end <= Utc::now();

        let internal =
            self.upsert_doc_page(event, DocDatabase::Internal, internal, start, end, finished)
                .await?;
        let external = if self.cfg.external_enabled {
            self.upsert_doc_page(event, DocDatabase::External, external, start, end, finished)
                .await?
        } else {
            None
        };

        if self.cfg.chat_enabled {
            if let Some(chat_id) = self.sync_chat(event, start, end, finished).await? {
                self.write_back_reference(&chat_id, internal.as_ref(), external.as_ref()).await?;
            }
        }

        Ok(())
    }

    /// Resolve the existing mirror page of `event` in `db`, repairing
    /// dangling correlation entries along the way.
    async fn resolve_doc_page(
        &self,
        event: &CanonicalEvent,
        db: DocDatabase,
    ) -> Result<Option<DocPage>> {
        let scope = db.scope();
        if let Some(page_id) = self.state.mirror_id(&event.calendar_id, scope).await? {
            match self.docs.get_page(&page_id).await? {
                Some(page) => return Ok(Some(page)),
                None => {
                    warn!(
                        calendar_event_id = %event.calendar_id,
                        scope = scope.as_str(),
                        %page_id,
                        "correlated page no longer exists; dropping mapping"
                    );
                    self.state.remove_mirror_id(&event.calendar_id, scope).await?;
                }
            }
        }

        // External rows may be keyed by the reference column (legacy rows).
        let found = match db {
            DocDatabase::Internal => {
                self.docs.find_by_calendar_id(db, &event.calendar_id).await?
            }
            DocDatabase::External => {
                match self.docs.find_by_reference(db, &event.calendar_id).await? {
                    Some(page) => Some(page),
                    None => self.docs.find_by_calendar_id(db, &event.calendar_id).await?,
                }
            }
        };
        if let Some(page) = &found {
            self.state.set_mirror_id(&event.calendar_id, scope, &page.id).await?;
        }
        Ok(found)
    }

    /// Archive every resolved mirror and drop the correlation record.
    async fn cancel(
        &self,
        event: &CanonicalEvent,
        internal: Option<&DocPage>,
        external: Option<&DocPage>,
    ) -> Result<()> {
        for (page, scope) in [
            (internal, MirrorScope::DocInternal),
            (external, MirrorScope::DocExternal),
        ] {
            if let Some(page) = page {
                self.docs.archive_page(&page.id).await?;
                self.state.remove_mirror_id(&event.calendar_id, scope).await?;
                info!(
                    calendar_event_id = %event.calendar_id,
                    scope = scope.as_str(),
                    page_id = %page.id,
                    "doc page archived for cancelled event"
                );
            }
        }

        if self.cfg.chat_enabled {
            match self.resolve_chat_event_id(&event.calendar_id).await? {
                Some(chat_id) => match self.chat.delete_event(&chat_id).await {
                    Ok(()) => {
                        info!(
                            calendar_event_id = %event.calendar_id,
                            chat_event_id = %chat_id,
                            "chat event deleted for cancelled calendar event"
                        );
                    }
                    Err(SyncError::NotFound(_)) => {
                        warn!(
                            calendar_event_id = %event.calendar_id,
                            chat_event_id = %chat_id,
                            "chat mirror already gone"
                        );
                    }
                    Err(err) => return Err(err),
                },
                None => {
                    warn!(
                        calendar_event_id = %event.calendar_id,
                        "chat delete skipped: mirror id unresolved"
                    );
                }
            }
            self.state.remove_mirror_id(&event.calendar_id, MirrorScope::ChatEvent).await?;
        }

        Ok(())
    }

    /// Create or update the mirror page of `event` in `db`.
    async fn upsert_doc_page(
        &self,
        event: &CanonicalEvent,
        db: DocDatabase,
        existing: Option<DocPage>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        finished: bool,
    ) -> Result<Option<DocPage>> {
        let scope = db.scope();
        if let Some(page) = existing {
            self.docs.update_page(&page.id, &self.doc_patch(event, db, start, end)).await?;
            debug!(
                calendar_event_id = %event.calendar_id,
                scope = scope.as_str(),
                page_id = %page.id,
                "doc page updated"
            );
            return Ok(Some(page));
        }
        if finished {
            info!(
                calendar_event_id = %event.calendar_id,
                scope = scope.as_str(),
                "skipping doc create for already-finished event"
            );
            return Ok(None);
        }
        let draft = self.doc_draft(event, db, start, end);
        let page_id = self.docs.create_page(db, &draft).await?;
        self.state.set_mirror_id(&event.calendar_id, scope, &page_id).await?;
        info!(
            calendar_event_id = %event.calendar_id,
            scope = scope.as_str(),
            %page_id,
            "doc page created"
        );
        Ok(Some(DocPage {
            id: page_id,
            calendar_event_id: Some(event.calendar_id.clone()),
            reference_id: None,
            start: Some(start),
            end: Some(end),
        }))
    }

    /// Mirror the event into the chat platform, returning the chat event id
    /// when one exists afterwards.
    async fn sync_chat(
        &self,
        event: &CanonicalEvent,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        finished: bool,
    ) -> Result<Option<String>> {
        let draft = self.chat_draft(event, start, end);
        match self.resolve_chat_event_id(&event.calendar_id).await? {
            Some(chat_id) => match self.chat.update_event(&chat_id, &draft).await {
                Ok(()) => {
                    debug!(
                        calendar_event_id = %event.calendar_id,
                        chat_event_id = %chat_id,
                        "chat event updated"
                    );
                    Ok(Some(chat_id))
                }
                // Never fall through to a create for a known id: a duplicate
                // is worse than a missed update.
                Err(SyncError::NotFound(_)) => {
                    warn!(
                        calendar_event_id = %event.calendar_id,
                        chat_event_id = %chat_id,
                        "chat update target missing; skipping create to avoid duplicates"
                    );
                    Ok(None)
                }
                Err(err) => Err(err),
            },
            None if finished => Ok(None),
            None => {
                let chat_id = self.chat.create_event(&draft).await?;
                self.state
                    .set_mirror_id(&event.calendar_id, MirrorScope::ChatEvent, &chat_id)
                    .await?;
                info!(
                    calendar_event_id = %event.calendar_id,
                    chat_event_id = %chat_id,
                    "chat event created"
                );
                Ok(Some(chat_id))
            }
        }
    }

    /// Chat mirror identity: correlation map, then (capability-gated) a scan
    /// of active chat events for the embedded origin tag.
    async fn resolve_chat_event_id(&self, calendar_id: &str) -> Result<Option<String>> {
        if let Some(id) = self.state.mirror_id(calendar_id, MirrorScope::ChatEvent).await? {
            return Ok(Some(id));
        }
        if !self.cfg.marker_scan_enabled {
            return Ok(None);
        }
        let marker = origin_marker(calendar_id);
        for chat_event in self.chat.list_events().await? {
            if chat_event.description.as_deref().is_some_and(|d| d.contains(&marker)) {
                debug!(calendar_event_id = %calendar_id, chat_event_id = %chat_event.id,
                    "chat mirror recovered via origin marker");
                self.state
                    .set_mirror_id(calendar_id, MirrorScope::ChatEvent, &chat_event.id)
                    .await?;
                return Ok(Some(chat_event.id));
            }
        }
        Ok(None)
    }

    /// Record the chat event id on the doc pages' reference column.
    async fn write_back_reference(
        &self,
        chat_id: &str,
        internal: Option<&DocPage>,
        external: Option<&DocPage>,
    ) -> Result<()> {
        let patch = DocPagePatch { reference_id: Some(chat_id.to_string()), ..Default::default() };
        for page in [internal, external].into_iter().flatten() {
            if page.reference_id.as_deref() != Some(chat_id) {
                self.docs.update_page(&page.id, &patch).await?;
            }
        }
        Ok(())
    }

    fn doc_draft(
        &self,
        event: &CanonicalEvent,
        db: DocDatabase,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DocPageDraft {
        let internal = db == DocDatabase::Internal;
        DocPageDraft {
            title: event.title.clone(),
            body: event.description.clone(),
            start,
            end: Some(end),
            creator: event.creator.clone(),
            reference_id: None,
            calendar_event_id: Some(event.calendar_id.clone()),
            event_url: if internal { event.event_url.clone() } else { None },
            location: if internal { event.location.clone() } else { None },
        }
    }

    fn doc_patch(
        &self,
        event: &CanonicalEvent,
        db: DocDatabase,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DocPagePatch {
        let internal = db == DocDatabase::Internal;
        DocPagePatch {
            title: Some(event.title.clone()),
            body: Some(event.description.clone()),
            start: Some(start),
            end: Some(end),
            reference_id: None,
            calendar_event_id: Some(event.calendar_id.clone()),
            event_url: if internal { event.event_url.clone() } else { None },
            location: if internal { event.location.clone() } else { None },
        }
    }

    fn chat_draft(
        &self,
        event: &CanonicalEvent,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ChatEventDraft {
        let mut description = event.description.trim().to_string();
        if self.cfg.marker_scan_enabled {
            let marker = origin_marker(&event.calendar_id);
            description =
                if description.is_empty() { marker } else { format!("{description}\n\n{marker}") };
        }
        let location = event
            .location
            .clone()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.cfg.location_fallback.clone());
        ChatEventDraft {
            name: clip_chars(&event.title, self.cfg.name_limit),
            description: clip_chars(&description, self.cfg.description_limit),
            start,
            end,
            location: clip_chars(&location, self.cfg.location_limit),
        }
    }
}
