//! File-backed implementation of the `StateStore` port
//!
//! Every mutation rewrites the owning JSON file before the call returns,
//! so the worst a crash can produce is "downstream record exists but the
//! correlation is unknown", which the reconciler repairs by direct query.
//! A corrupted or missing file degrades to empty state with a warning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosscal_domain::constants::DEDUP_CAPACITY_FLOOR;
use crosscal_domain::{MirrorScope, Result, SyncError};
use crosscal_core::StateStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use super::recency::RecencySet;

const CORRELATION_FILE: &str = "correlation_map.json";
const CHAT_MAP_FILE: &str = "chat_event_map.json";
const CURSOR_FILE: &str = "sync_cursor.json";
const DEDUP_FILE: &str = "recent_notifications.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CorrelationFile {
    #[serde(default)]
    internal: HashMap<String, String>,
    #[serde(default)]
    external: HashMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ChatMapFile {
    #[serde(default)]
    map: HashMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CursorFile {
    #[serde(default)]
    updated_min: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DedupFile {
    #[serde(default)]
    tokens: Vec<String>,
}

struct StateInner {
    correlation: CorrelationFile,
    chat_map: HashMap<String, String>,
    cursor: Option<DateTime<Utc>>,
    recent: RecencySet,
}

/// JSON-file-backed durable state, shared by both reconciliation
/// directions. An internal async mutex makes each read-modify-write
/// sequence atomic.
pub struct FileStateStore {
    dir: PathBuf,
    inner: Mutex<StateInner>,
}

impl FileStateStore {
    /// Open (or initialise) the state directory. The dedup capacity is
    /// clamped to a sane floor.
    pub fn open(dir: impl Into<PathBuf>, dedup_capacity: usize) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|err| SyncError::State(format!("cannot create state dir: {err}")))?;

        let correlation: CorrelationFile = load_or_default(&dir.join(CORRELATION_FILE));
        let chat_map: ChatMapFile = load_or_default(&dir.join(CHAT_MAP_FILE));
        let cursor: CursorFile = load_or_default(&dir.join(CURSOR_FILE));
        let dedup: DedupFile = load_or_default(&dir.join(DEDUP_FILE));

        let capacity = dedup_capacity.max(DEDUP_CAPACITY_FLOOR);
        let inner = StateInner {
            correlation,
            chat_map: chat_map.map,
            cursor: cursor.updated_min,
            recent: RecencySet::from_tokens(capacity, dedup.tokens),
        };
        Ok(Self { dir, inner: Mutex::new(inner) })
    }

    fn persist_correlation(&self, inner: &StateInner) -> Result<()> {
        write_json(&self.dir.join(CORRELATION_FILE), &inner.correlation)
    }

    fn persist_chat_map(&self, inner: &StateInner) -> Result<()> {
        write_json(&self.dir.join(CHAT_MAP_FILE), &ChatMapFile { map: inner.chat_map.clone() })
    }

    fn persist_cursor(&self, inner: &StateInner) -> Result<()> {
        write_json(&self.dir.join(CURSOR_FILE), &CursorFile { updated_min: inner.cursor })
    }

    fn persist_dedup(&self, inner: &StateInner) -> Result<()> {
        let tokens: Vec<String> = inner.recent.tokens().map(str::to_string).collect();
        write_json(&self.dir.join(DEDUP_FILE), &DedupFile { tokens })
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %path.display(), error = %err,
                    "state file corrupted; starting from empty state");
                T::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => T::default(),
        Err(err) => {
            warn!(path = %path.display(), error = %err,
                "state file unreadable; starting from empty state");
            T::default()
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_string_pretty(value)
        .map_err(|err| SyncError::State(format!("state serialisation error: {err}")))?;
    std::fs::write(path, contents)
        .map_err(|err| SyncError::State(format!("state write error ({}): {err}", path.display())))
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn mirror_id(&self, calendar_id: &str, scope: MirrorScope) -> Result<Option<String>> {
        let inner = self.inner.lock().await;
        let id = match scope {
            MirrorScope::DocInternal => inner.correlation.internal.get(calendar_id),
            MirrorScope::DocExternal => inner.correlation.external.get(calendar_id),
            MirrorScope::ChatEvent => inner.chat_map.get(calendar_id),
        };
        Ok(id.cloned())
    }

    async fn set_mirror_id(
        &self,
        calendar_id: &str,
        scope: MirrorScope,
        mirror_id: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match scope {
            MirrorScope::DocInternal => {
                inner.correlation.internal.insert(calendar_id.into(), mirror_id.into());
                self.persist_correlation(&inner)
            }
            MirrorScope::DocExternal => {
                inner.correlation.external.insert(calendar_id.into(), mirror_id.into());
                self.persist_correlation(&inner)
            }
            MirrorScope::ChatEvent => {
                inner.chat_map.insert(calendar_id.into(), mirror_id.into());
                self.persist_chat_map(&inner)
            }
        }
    }

    async fn remove_mirror_id(&self, calendar_id: &str, scope: MirrorScope) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match scope {
            MirrorScope::DocInternal => {
                if inner.correlation.internal.remove(calendar_id).is_some() {
                    return self.persist_correlation(&inner);
                }
            }
            MirrorScope::DocExternal => {
                if inner.correlation.external.remove(calendar_id).is_some() {
                    return self.persist_correlation(&inner);
                }
            }
            MirrorScope::ChatEvent => {
                if inner.chat_map.remove(calendar_id).is_some() {
                    return self.persist_chat_map(&inner);
                }
            }
        }
        Ok(())
    }

    async fn calendar_id_for_chat_event(&self, chat_event_id: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .chat_map
            .iter()
            .find(|(_, chat_id)| chat_id.as_str() == chat_event_id)
            .map(|(calendar_id, _)| calendar_id.clone()))
    }

    async fn cursor(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.inner.lock().await.cursor)
    }

    async fn set_cursor(&self, cursor: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.cursor = Some(cursor);
        self.persist_cursor(&inner)
    }

    async fn register_notification(&self, token: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let seen = inner.recent.register(token);
        if !seen {
            self.persist_dedup(&inner)?;
        }
        Ok(seen)
    }
}
