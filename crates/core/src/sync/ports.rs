//! Port interfaces for the reconciliation engine
//!
//! Implemented by `crosscal-infra` against the real collaborators and by
//! in-memory mocks in tests. Transport authentication, pagination and wire
//! formats live behind these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosscal_domain::{
    CalendarEventDraft, CanonicalEvent, ChatEventDraft, ChatScheduledEvent, DocDatabase, DocPage,
    DocPageDraft, DocPagePatch, MirrorScope, Result,
};

/// Calendar collaborator (the canonical source of the outbound direction).
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// List events modified at or after `updated_min`, including cancelled
    /// tombstones. Returns `Err(SyncError::CursorExpired)` when the
    /// collaborator rejects the cursor as too old.
    async fn list_changed_since(&self, updated_min: DateTime<Utc>) -> Result<Vec<CanonicalEvent>>;

    /// Unbounded full listing, including cancelled events. Used as the
    /// cursor-expiry fallback.
    async fn list_all(&self) -> Result<Vec<CanonicalEvent>>;

    async fn create_event(&self, draft: &CalendarEventDraft) -> Result<String>;

    async fn update_event(&self, id: &str, draft: &CalendarEventDraft) -> Result<()>;

    async fn delete_event(&self, id: &str) -> Result<()>;
}

/// Document-store collaborator.
#[async_trait]
pub trait DocumentGateway: Send + Sync {
    /// Fetch a page by id. Archived or missing pages resolve to `None` so
    /// callers can recover from dangling correlation entries.
    async fn get_page(&self, page_id: &str) -> Result<Option<DocPage>>;

    /// Query by the calendar event id column.
    async fn find_by_calendar_id(&self, db: DocDatabase, calendar_id: &str)
        -> Result<Option<DocPage>>;

    /// Query by the reference (foreign-key) column.
    async fn find_by_reference(&self, db: DocDatabase, reference_id: &str)
        -> Result<Option<DocPage>>;

    async fn create_page(&self, db: DocDatabase, draft: &DocPageDraft) -> Result<String>;

    async fn update_page(&self, page_id: &str, patch: &DocPagePatch) -> Result<()>;

    async fn archive_page(&self, page_id: &str) -> Result<()>;

    /// List every active page of a database. Only used by the retention
    /// sweeper.
    async fn list_pages(&self, db: DocDatabase) -> Result<Vec<DocPage>>;
}

/// Chat-platform collaborator (scheduled events).
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn create_event(&self, draft: &ChatEventDraft) -> Result<String>;

    async fn update_event(&self, id: &str, draft: &ChatEventDraft) -> Result<()>;

    async fn delete_event(&self, id: &str) -> Result<()>;

    /// Full listing of active scheduled events. Only used by the
    /// marker-scan identity fallback.
    async fn list_events(&self) -> Result<Vec<ChatScheduledEvent>>;
}

/// Durable cross-store state: correlation map, chat-calendar id map, sync
/// cursor and the duplicate-notification recency set. Implementations must
/// flush every write before returning and serialise concurrent access from
/// the two reconciliation directions.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn mirror_id(&self, calendar_id: &str, scope: MirrorScope) -> Result<Option<String>>;

    async fn set_mirror_id(
        &self,
        calendar_id: &str,
        scope: MirrorScope,
        mirror_id: &str,
    ) -> Result<()>;

    async fn remove_mirror_id(&self, calendar_id: &str, scope: MirrorScope) -> Result<()>;

    /// Reverse lookup over the chat-calendar id map.
    async fn calendar_id_for_chat_event(&self, chat_event_id: &str) -> Result<Option<String>>;

    async fn cursor(&self) -> Result<Option<DateTime<Utc>>>;

    async fn set_cursor(&self, cursor: DateTime<Utc>) -> Result<()>;

    /// Insert a notification token into the bounded recency set, reporting
    /// whether it had already been seen.
    async fn register_notification(&self, token: &str) -> Result<bool>;
}
