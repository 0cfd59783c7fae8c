//! Google Calendar gateway implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use crosscal_core::CalendarGateway;
use crosscal_domain::{
    CalendarConfig, CalendarEventDraft, CanonicalEvent, EventStatus, Result, SyncError,
};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::http::HttpClient;

/// Error reason Google attaches to a 410 when the `updatedMin` cursor is
/// older than its retention window.
const CURSOR_TOO_OLD_REASON: &str = "updatedMinTooLongAgo";

/// Google Calendar v3 client
pub struct GoogleCalendarClient {
    http: HttpClient,
    api_base: String,
    calendar_id: String,
    token: String,
}

impl GoogleCalendarClient {
    pub fn new(config: &CalendarConfig) -> Result<Self> {
        let http = HttpClient::builder().build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
            token: config.token.clone(),
        })
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.api_base, self.calendar_id)
    }

    fn event_url(&self, id: &str) -> String {
        format!("{}/{}", self.events_url(), id)
    }

    /// Paginated listing; `updated_min = None` is the unbounded full fetch.
    async fn list(&self, updated_min: Option<DateTime<Utc>>) -> Result<Vec<CanonicalEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .request(Method::GET, self.events_url())
                .bearer_auth(&self.token)
                .query(&[
                    ("singleEvents", "true"),
                    ("showDeleted", "true"),
                    ("maxResults", "2500"),
                ]);
            if let Some(updated_min) = updated_min {
                request = request.query(&[("updatedMin", updated_min.to_rfc3339())]);
            }
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = self.http.send(request).await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                if status == StatusCode::GONE || body.contains(CURSOR_TOO_OLD_REASON) {
                    return Err(SyncError::CursorExpired);
                }
                return Err(SyncError::Network(format!(
                    "calendar listing failed ({status}): {body}"
                )));
            }

            let page: EventsPage = response.json().await.map_err(|err| {
                SyncError::InvalidInput(format!("unparseable calendar listing: {err}"))
            })?;
            events.extend(page.items.into_iter().filter_map(canonical_from_raw));

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(events)
    }
}

#[async_trait]
impl CalendarGateway for GoogleCalendarClient {
    async fn list_changed_since(&self, updated_min: DateTime<Utc>) -> Result<Vec<CanonicalEvent>> {
        self.list(Some(updated_min)).await
    }

    async fn list_all(&self) -> Result<Vec<CanonicalEvent>> {
        self.list(None).await
    }

    async fn create_event(&self, draft: &CalendarEventDraft) -> Result<String> {
        let request = self
            .http
            .request(Method::POST, self.events_url())
            .bearer_auth(&self.token)
            .json(&EventBody::from_draft(draft));
        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!("calendar create failed ({status}): {body}")));
        }
        let created: CreatedEvent = response
            .json()
            .await
            .map_err(|err| SyncError::InvalidInput(format!("unparseable create reply: {err}")))?;
        Ok(created.id)
    }

    async fn update_event(&self, id: &str, draft: &CalendarEventDraft) -> Result<()> {
        let request = self
            .http
            .request(Method::PATCH, self.event_url(id))
            .bearer_auth(&self.token)
            .json(&EventBody::from_draft(draft));
        let response = self.http.send(request).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(SyncError::NotFound(format!("calendar event {id}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!("calendar update failed ({status}): {body}")));
        }
        Ok(())
    }

    async fn delete_event(&self, id: &str) -> Result<()> {
        let request =
            self.http.request(Method::DELETE, self.event_url(id)).bearer_auth(&self.token);
        let response = self.http.send(request).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(SyncError::NotFound(format!("calendar event {id}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!("calendar delete failed ({status}): {body}")));
        }
        Ok(())
    }
}

fn canonical_from_raw(raw: RawEvent) -> Option<CanonicalEvent> {
    let Some(id) = raw.id else {
        warn!("calendar event without id skipped");
        return None;
    };
    let status = match raw.status.as_deref() {
        Some("cancelled") => EventStatus::Cancelled,
        _ => EventStatus::Active,
    };
    Some(CanonicalEvent {
        calendar_id: id,
        title: raw.summary.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| "(no title)".into()),
        description: raw.description.unwrap_or_default(),
        start: raw.start.and_then(parse_event_time),
        end: raw.end.and_then(parse_event_time),
        location: raw.location.filter(|l| !l.trim().is_empty()),
        creator: raw
            .creator
            .and_then(|c| c.email)
            .unwrap_or_else(|| "unknown".into()),
        event_url: raw.html_link,
        status,
        updated: raw.updated.and_then(|value| parse_rfc3339(&value)),
    })
}

fn parse_event_time(value: EventTime) -> Option<DateTime<Utc>> {
    if let Some(date_time) = value.date_time {
        return parse_rfc3339(&date_time);
    }
    // All-day events carry a bare date; midnight UTC keeps ordering stable.
    let date = NaiveDate::parse_from_str(value.date.as_deref()?, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<RawEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    id: Option<String>,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
    updated: Option<String>,
    html_link: Option<String>,
    creator: Option<Creator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Creator {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBody {
    summary: String,
    description: String,
    start: EventBodyTime,
    end: EventBodyTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBodyTime {
    date_time: String,
    time_zone: String,
}

impl EventBody {
    fn from_draft(draft: &CalendarEventDraft) -> Self {
        Self {
            summary: draft.title.clone(),
            description: draft.description.clone(),
            start: EventBodyTime {
                date_time: draft.start.to_rfc3339(),
                time_zone: "UTC".to_string(),
            },
            end: EventBodyTime { date_time: draft.end.to_rfc3339(), time_zone: "UTC".to_string() },
            location: draft.location.clone(),
        }
    }
}
