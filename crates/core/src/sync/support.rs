//! In-memory mock gateways for reconciliation tests
//!
//! Each mock records its mutating calls so tests can assert call counts
//! (idempotence, cancellation propagation, loop prevention).

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosscal_domain::{
    CalendarEventDraft, CanonicalEvent, ChatEventDraft, ChatScheduledEvent, DocDatabase, DocPage,
    DocPageDraft, DocPagePatch, EventStatus, MirrorScope, Result, SyncError,
};
use parking_lot::Mutex;

use super::ports::{CalendarGateway, ChatGateway, DocumentGateway, StateStore};

pub(crate) fn sample_event(calendar_id: &str, start: DateTime<Utc>) -> CanonicalEvent {
    CanonicalEvent {
        calendar_id: calendar_id.to_string(),
        title: "Sprint Review".into(),
        description: "Demo and retro".into(),
        start: Some(start),
        end: None,
        location: None,
        creator: "alice@example.com".into(),
        event_url: Some("https://calendar.example.com/e/1".into()),
        status: EventStatus::Active,
        updated: Some(start),
    }
}

// ============================================================================
// State store
// ============================================================================

#[derive(Default)]
pub(crate) struct MockStateStore {
    inner: Mutex<StateInner>,
}

#[derive(Default)]
struct StateInner {
    mirrors: HashMap<(String, MirrorScope), String>,
    cursor: Option<DateTime<Utc>>,
    tokens: Vec<String>,
}

impl MockStateStore {
    pub fn mirror(&self, calendar_id: &str, scope: MirrorScope) -> Option<String> {
        self.inner.lock().mirrors.get(&(calendar_id.to_string(), scope)).cloned()
    }

    pub fn seed_mirror(&self, calendar_id: &str, scope: MirrorScope, id: &str) {
        self.inner.lock().mirrors.insert((calendar_id.to_string(), scope), id.to_string());
    }

    pub fn stored_cursor(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().cursor
    }

    pub fn seed_cursor(&self, cursor: DateTime<Utc>) {
        self.inner.lock().cursor = Some(cursor);
    }
}

#[async_trait]
impl StateStore for MockStateStore {
    async fn mirror_id(&self, calendar_id: &str, scope: MirrorScope) -> Result<Option<String>> {
        Ok(self.mirror(calendar_id, scope))
    }

    async fn set_mirror_id(
        &self,
        calendar_id: &str,
        scope: MirrorScope,
        mirror_id: &str,
    ) -> Result<()> {
        self.seed_mirror(calendar_id, scope, mirror_id);
        Ok(())
    }

    async fn remove_mirror_id(&self, calendar_id: &str, scope: MirrorScope) -> Result<()> {
        self.inner.lock().mirrors.remove(&(calendar_id.to_string(), scope));
        Ok(())
    }

    async fn calendar_id_for_chat_event(&self, chat_event_id: &str) -> Result<Option<String>> {
        let inner = self.inner.lock();
        Ok(inner
            .mirrors
            .iter()
            .find(|((_, scope), id)| *scope == MirrorScope::ChatEvent && id.as_str() == chat_event_id)
            .map(|((calendar_id, _), _)| calendar_id.clone()))
    }

    async fn cursor(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.inner.lock().cursor)
    }

    async fn set_cursor(&self, cursor: DateTime<Utc>) -> Result<()> {
        self.inner.lock().cursor = Some(cursor);
        Ok(())
    }

    async fn register_notification(&self, token: &str) -> Result<bool> {
        let mut inner = self.inner.lock();
        if inner.tokens.iter().any(|t| t == token) {
            return Ok(true);
        }
        inner.tokens.push(token.to_string());
        Ok(false)
    }
}

// ============================================================================
// Document gateway
// ============================================================================

#[derive(Default)]
pub(crate) struct MockDocumentGateway {
    inner: Mutex<DocInner>,
}

#[derive(Default)]
struct DocInner {
    pages: HashMap<String, (DocDatabase, DocPage)>,
    next_id: usize,
    creates: Vec<(DocDatabase, DocPageDraft)>,
    updates: Vec<(String, DocPagePatch)>,
    archives: Vec<String>,
}

impl MockDocumentGateway {
    pub fn seed_page(&self, db: DocDatabase, page: DocPage) {
        self.inner.lock().pages.insert(page.id.clone(), (db, page));
    }

    pub fn create_count(&self, db: DocDatabase) -> usize {
        self.inner.lock().creates.iter().filter(|(d, _)| *d == db).count()
    }

    pub fn creates(&self) -> Vec<(DocDatabase, DocPageDraft)> {
        self.inner.lock().creates.clone()
    }

    pub fn updates(&self) -> Vec<(String, DocPagePatch)> {
        self.inner.lock().updates.clone()
    }

    pub fn archives(&self) -> Vec<String> {
        self.inner.lock().archives.clone()
    }

    pub fn page(&self, id: &str) -> Option<DocPage> {
        self.inner.lock().pages.get(id).map(|(_, page)| page.clone())
    }
}

#[async_trait]
impl DocumentGateway for MockDocumentGateway {
    async fn get_page(&self, page_id: &str) -> Result<Option<DocPage>> {
        Ok(self.page(page_id))
    }

    async fn find_by_calendar_id(
        &self,
        db: DocDatabase,
        calendar_id: &str,
    ) -> Result<Option<DocPage>> {
        let inner = self.inner.lock();
        Ok(inner
            .pages
            .values()
            .find(|(d, page)| *d == db && page.calendar_event_id.as_deref() == Some(calendar_id))
            .map(|(_, page)| page.clone()))
    }

    async fn find_by_reference(
        &self,
        db: DocDatabase,
        reference_id: &str,
    ) -> Result<Option<DocPage>> {
        let inner = self.inner.lock();
        Ok(inner
            .pages
            .values()
            .find(|(d, page)| *d == db && page.reference_id.as_deref() == Some(reference_id))
            .map(|(_, page)| page.clone()))
    }

    async fn create_page(&self, db: DocDatabase, draft: &DocPageDraft) -> Result<String> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = format!("page-{}", inner.next_id);
        let page = DocPage {
            id: id.clone(),
            calendar_event_id: draft.calendar_event_id.clone(),
            reference_id: draft.reference_id.clone(),
            start: Some(draft.start),
            end: draft.end,
        };
        inner.pages.insert(id.clone(), (db, page));
        inner.creates.push((db, draft.clone()));
        Ok(id)
    }

    async fn update_page(&self, page_id: &str, patch: &DocPagePatch) -> Result<()> {
        let mut inner = self.inner.lock();
        let Some((_, page)) = inner.pages.get_mut(page_id) else {
            return Err(SyncError::NotFound(format!("page {page_id}")));
        };
        if let Some(start) = patch.start {
            page.start = Some(start);
            page.end = patch.end;
        }
        if let Some(reference_id) = &patch.reference_id {
            page.reference_id = Some(reference_id.clone());
        }
        if let Some(calendar_event_id) = &patch.calendar_event_id {
            page.calendar_event_id = Some(calendar_event_id.clone());
        }
        inner.updates.push((page_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn archive_page(&self, page_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.pages.remove(page_id);
        inner.archives.push(page_id.to_string());
        Ok(())
    }

    async fn list_pages(&self, db: DocDatabase) -> Result<Vec<DocPage>> {
        let inner = self.inner.lock();
        Ok(inner
            .pages
            .values()
            .filter(|(d, _)| *d == db)
            .map(|(_, page)| page.clone())
            .collect())
    }
}

// ============================================================================
// Chat gateway
// ============================================================================

#[derive(Default)]
pub(crate) struct MockChatGateway {
    inner: Mutex<ChatInner>,
}

#[derive(Default)]
struct ChatInner {
    events: HashMap<String, ChatEventDraft>,
    next_id: usize,
    creates: Vec<ChatEventDraft>,
    updates: Vec<(String, ChatEventDraft)>,
    deletes: Vec<String>,
    listing: Vec<ChatScheduledEvent>,
}

impl MockChatGateway {
    pub fn seed_event(&self, id: &str, draft: ChatEventDraft) {
        self.inner.lock().events.insert(id.to_string(), draft);
    }

    pub fn seed_listing(&self, events: Vec<ChatScheduledEvent>) {
        self.inner.lock().listing = events;
    }

    pub fn creates(&self) -> Vec<ChatEventDraft> {
        self.inner.lock().creates.clone()
    }

    pub fn updates(&self) -> Vec<(String, ChatEventDraft)> {
        self.inner.lock().updates.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.inner.lock().deletes.clone()
    }
}

#[async_trait]
impl ChatGateway for MockChatGateway {
    async fn create_event(&self, draft: &ChatEventDraft) -> Result<String> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = format!("chat-{}", inner.next_id);
        inner.events.insert(id.clone(), draft.clone());
        inner.creates.push(draft.clone());
        Ok(id)
    }

    async fn update_event(&self, id: &str, draft: &ChatEventDraft) -> Result<()> {
        let mut inner = self.inner.lock();
        let Some(existing) = inner.events.get_mut(id) else {
            return Err(SyncError::NotFound(format!("chat event {id}")));
        };
        *existing = draft.clone();
        inner.updates.push((id.to_string(), draft.clone()));
        Ok(())
    }

    async fn delete_event(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.events.remove(id).is_none() {
            return Err(SyncError::NotFound(format!("chat event {id}")));
        }
        inner.deletes.push(id.to_string());
        Ok(())
    }

    async fn list_events(&self) -> Result<Vec<ChatScheduledEvent>> {
        Ok(self.inner.lock().listing.clone())
    }
}

// ============================================================================
// Calendar gateway
// ============================================================================

#[derive(Default)]
pub(crate) struct MockCalendarGateway {
    inner: Mutex<CalInner>,
}

#[derive(Default)]
struct CalInner {
    changed_results: VecDeque<Result<Vec<CanonicalEvent>>>,
    all_events: Vec<CanonicalEvent>,
    list_all_calls: usize,
    list_changed_calls: Vec<DateTime<Utc>>,
    creates: Vec<CalendarEventDraft>,
    updates: Vec<(String, CalendarEventDraft)>,
    deletes: Vec<String>,
    next_id: usize,
}

impl MockCalendarGateway {
    pub fn push_changed_result(&self, result: Result<Vec<CanonicalEvent>>) {
        self.inner.lock().changed_results.push_back(result);
    }

    pub fn set_all_events(&self, events: Vec<CanonicalEvent>) {
        self.inner.lock().all_events = events;
    }

    pub fn list_all_calls(&self) -> usize {
        self.inner.lock().list_all_calls
    }

    pub fn list_changed_calls(&self) -> Vec<DateTime<Utc>> {
        self.inner.lock().list_changed_calls.clone()
    }

    pub fn creates(&self) -> Vec<CalendarEventDraft> {
        self.inner.lock().creates.clone()
    }

    pub fn updates(&self) -> Vec<(String, CalendarEventDraft)> {
        self.inner.lock().updates.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.inner.lock().deletes.clone()
    }
}

#[async_trait]
impl CalendarGateway for MockCalendarGateway {
    async fn list_changed_since(&self, updated_min: DateTime<Utc>) -> Result<Vec<CanonicalEvent>> {
        let mut inner = self.inner.lock();
        inner.list_changed_calls.push(updated_min);
        inner.changed_results.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn list_all(&self) -> Result<Vec<CanonicalEvent>> {
        let mut inner = self.inner.lock();
        inner.list_all_calls += 1;
        Ok(inner.all_events.clone())
    }

    async fn create_event(&self, draft: &CalendarEventDraft) -> Result<String> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = format!("cal-{}", inner.next_id);
        inner.creates.push(draft.clone());
        Ok(id)
    }

    async fn update_event(&self, id: &str, draft: &CalendarEventDraft) -> Result<()> {
        self.inner.lock().updates.push((id.to_string(), draft.clone()));
        Ok(())
    }

    async fn delete_event(&self, id: &str) -> Result<()> {
        self.inner.lock().deletes.push(id.to_string());
        Ok(())
    }
}
