//! Core domain types for cross-store event synchronisation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a canonical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Cancelled,
}

/// In-memory projection of one event, derived per reconciliation pass from
/// whichever store reported the change. Never persisted as its own entity.
///
/// `start` is optional because cancelled tombstones from the calendar's
/// incremental feed carry no times; an *active* event without a start is
/// malformed and dropped by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Stable identifier in the calendar store, the correlation key.
    pub calendar_id: String,
    pub title: String,
    pub description: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub creator: String,
    pub event_url: Option<String>,
    pub status: EventStatus,
    /// Last-modified stamp from the source store; only consumed for cursor
    /// advancement, never mirrored downstream.
    pub updated: Option<DateTime<Utc>>,
}

impl CanonicalEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }

    /// Effective end time: the stored end when it lies after the start,
    /// otherwise start + 1 hour. `None` when the event has no start.
    pub fn end_or_default(&self) -> Option<DateTime<Utc>> {
        let start = self.start?;
        match self.end {
            Some(end) if end > start => Some(end),
            _ => Some(start + Duration::hours(1)),
        }
    }
}

/// Which downstream store a mirror id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorScope {
    ChatEvent,
    DocInternal,
    DocExternal,
}

impl MirrorScope {
    pub fn as_str(self) -> &'static str {
        match self {
            MirrorScope::ChatEvent => "chat_event",
            MirrorScope::DocInternal => "doc_internal",
            MirrorScope::DocExternal => "doc_external",
        }
    }
}

/// Which document-store database an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocDatabase {
    Internal,
    External,
}

impl DocDatabase {
    pub fn scope(self) -> MirrorScope {
        match self {
            DocDatabase::Internal => MirrorScope::DocInternal,
            DocDatabase::External => MirrorScope::DocExternal,
        }
    }
}

/// A page read back from the document store, reduced to the fields the
/// reconciliation engine needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocPage {
    pub id: String,
    /// Calendar event id stored on the page, when present.
    pub calendar_event_id: Option<String>,
    /// Chat event id (or foreign-key reference) stored on the page.
    pub reference_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Field set written when creating a document page.
#[derive(Debug, Clone, PartialEq)]
pub struct DocPageDraft {
    pub title: String,
    pub body: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub creator: String,
    /// Chat event id (or foreign-key reference) column.
    pub reference_id: Option<String>,
    pub calendar_event_id: Option<String>,
    pub event_url: Option<String>,
    pub location: Option<String>,
}

/// Partial update against an existing page. `None` fields are left
/// untouched; `end` is only written when `start` is also set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocPagePatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub reference_id: Option<String>,
    pub calendar_event_id: Option<String>,
    pub event_url: Option<String>,
    pub location: Option<String>,
}

/// Field set for creating or patching a calendar event.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEventDraft {
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
}

/// Field set for creating or patching a chat-platform scheduled event.
/// Values are expected to be pre-clipped to the platform's field limits.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEventDraft {
    pub name: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
}

/// A scheduled event as reported by the chat platform, either from its
/// change callbacks or from a full listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatScheduledEvent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    pub creator_id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Clip a string to at most `max` characters, respecting char boundaries.
pub fn clip_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
