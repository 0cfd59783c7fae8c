//! Shared harness for the HTTP surface tests: in-memory gateways wired
//! into a real `AppContext` over a file-backed state store.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosscal_app::AppContext;
use crosscal_core::{CalendarGateway, ChatGateway, DocumentGateway};
use crosscal_domain::{
    CalendarConfig, CalendarEventDraft, CanonicalEvent, ChatConfig, ChatEventDraft,
    ChatScheduledEvent, Config, DocDatabase, DocPage, DocPageDraft, DocPagePatch, DocStoreConfig,
    Result, ServerConfig, SyncTuning,
};
use crosscal_infra::FileStateStore;
use parking_lot::Mutex;
use tempfile::TempDir;

/// Calendar stub with scripted listing results and call recording.
#[derive(Default)]
pub struct StubCalendar {
    results: Mutex<VecDeque<Result<Vec<CanonicalEvent>>>>,
    list_calls: Mutex<usize>,
    creates: Mutex<Vec<CalendarEventDraft>>,
}

impl StubCalendar {
    pub fn push_result(&self, result: Result<Vec<CanonicalEvent>>) {
        self.results.lock().push_back(result);
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock()
    }

    pub fn creates(&self) -> Vec<CalendarEventDraft> {
        self.creates.lock().clone()
    }
}

#[async_trait]
impl CalendarGateway for StubCalendar {
    async fn list_changed_since(&self, _updated_min: DateTime<Utc>) -> Result<Vec<CanonicalEvent>> {
        *self.list_calls.lock() += 1;
        self.results.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn list_all(&self) -> Result<Vec<CanonicalEvent>> {
        Ok(Vec::new())
    }

    async fn create_event(&self, draft: &CalendarEventDraft) -> Result<String> {
        let mut creates = self.creates.lock();
        creates.push(draft.clone());
        Ok(format!("cal-{}", creates.len()))
    }

    async fn update_event(&self, _id: &str, _draft: &CalendarEventDraft) -> Result<()> {
        Ok(())
    }

    async fn delete_event(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}

/// Document-store stub: records creates, answers queries with nothing.
#[derive(Default)]
pub struct StubDocs {
    creates: Mutex<Vec<(DocDatabase, DocPageDraft)>>,
}

impl StubDocs {
    pub fn creates(&self) -> Vec<(DocDatabase, DocPageDraft)> {
        self.creates.lock().clone()
    }
}

#[async_trait]
impl DocumentGateway for StubDocs {
    async fn get_page(&self, _page_id: &str) -> Result<Option<DocPage>> {
        Ok(None)
    }

    async fn find_by_calendar_id(
        &self,
        _db: DocDatabase,
        _calendar_id: &str,
    ) -> Result<Option<DocPage>> {
        Ok(None)
    }

    async fn find_by_reference(
        &self,
        _db: DocDatabase,
        _reference_id: &str,
    ) -> Result<Option<DocPage>> {
        Ok(None)
    }

    async fn create_page(&self, db: DocDatabase, draft: &DocPageDraft) -> Result<String> {
        let mut creates = self.creates.lock();
        creates.push((db, draft.clone()));
        Ok(format!("page-{}", creates.len()))
    }

    async fn update_page(&self, _page_id: &str, _patch: &DocPagePatch) -> Result<()> {
        Ok(())
    }

    async fn archive_page(&self, _page_id: &str) -> Result<()> {
        Ok(())
    }

    async fn list_pages(&self, _db: DocDatabase) -> Result<Vec<DocPage>> {
        Ok(Vec::new())
    }
}

/// Chat stub recording create calls.
#[derive(Default)]
pub struct StubChat {
    creates: Mutex<Vec<ChatEventDraft>>,
}

impl StubChat {
    pub fn creates(&self) -> Vec<ChatEventDraft> {
        self.creates.lock().clone()
    }
}

#[async_trait]
impl ChatGateway for StubChat {
    async fn create_event(&self, draft: &ChatEventDraft) -> Result<String> {
        let mut creates = self.creates.lock();
        creates.push(draft.clone());
        Ok(format!("chat-{}", creates.len()))
    }

    async fn update_event(&self, _id: &str, _draft: &ChatEventDraft) -> Result<()> {
        Ok(())
    }

    async fn delete_event(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn list_events(&self) -> Result<Vec<ChatScheduledEvent>> {
        Ok(Vec::new())
    }
}

pub struct Harness {
    pub ctx: Arc<AppContext>,
    pub calendar: Arc<StubCalendar>,
    pub docs: Arc<StubDocs>,
    pub chat: Arc<StubChat>,
    _state_dir: TempDir,
}

/// Build a context over stub gateways. `cooldown_seconds = 0` lets tests
/// trigger back-to-back passes.
pub fn harness(cooldown_seconds: u64) -> Harness {
    let state_dir = TempDir::new().expect("temp state dir");
    let config = Config {
        server: ServerConfig::default(),
        calendar: CalendarConfig {
            calendar_id: "primary".into(),
            token: "cal-token".into(),
            api_base: "http://calendar.invalid".into(),
        },
        docs: DocStoreConfig {
            token: "docs-token".into(),
            internal_db_id: "db-int".into(),
            external_db_id: Some("db-ext".into()),
            api_base: "http://docs.invalid".into(),
        },
        chat: ChatConfig {
            token: "chat-token".into(),
            guild_id: "guild-1".into(),
            bot_user_id: "bot-1".into(),
            ..ChatConfig::default()
        },
        sync: SyncTuning {
            state_dir: state_dir.path().display().to_string(),
            cooldown_seconds,
            ..SyncTuning::default()
        },
    };

    let state = Arc::new(
        FileStateStore::open(state_dir.path(), config.sync.dedup_capacity)
            .expect("state store opened"),
    );
    let calendar = Arc::new(StubCalendar::default());
    let docs = Arc::new(StubDocs::default());
    let chat = Arc::new(StubChat::default());

    let ctx = Arc::new(AppContext::assemble(
        config,
        state,
        calendar.clone(),
        docs.clone(),
        chat.clone(),
    ));
    Harness { ctx, calendar, docs, chat, _state_dir: state_dir }
}

/// A sample chat callback body.
pub fn chat_callback_json(action: &str, creator_id: &str) -> serde_json::Value {
    serde_json::json!({
        "action": action,
        "event": {
            "id": "chat-ev-1",
            "name": "Community Meetup",
            "description": "Monthly gathering",
            "start": (Utc::now() + chrono::Duration::hours(48)).to_rfc3339(),
            "creator_id": creator_id,
            "location": "Hall A"
        }
    })
}
