//! Discord chat-platform gateway implementation (guild scheduled events)

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use crosscal_core::ChatGateway;
use crosscal_domain::{ChatConfig, ChatEventDraft, ChatScheduledEvent, Result, SyncError};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::http::HttpClient;

/// Guild scheduled events are "external" events with a location string.
const ENTITY_TYPE_EXTERNAL: u8 = 3;
/// The only privacy level the API currently accepts.
const PRIVACY_GUILD_ONLY: u8 = 2;

/// Discord REST client
pub struct DiscordClient {
    http: HttpClient,
    api_base: String,
    guild_id: String,
}

impl DiscordClient {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bot {}", config.token))
            .map_err(|err| SyncError::Config(format!("invalid chat token: {err}")))?;
        headers.insert("Authorization", auth);
        let http = HttpClient::builder().default_headers(headers).build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            guild_id: config.guild_id.clone(),
        })
    }

    fn events_url(&self) -> String {
        format!("{}/guilds/{}/scheduled-events", self.api_base, self.guild_id)
    }

    fn event_url(&self, id: &str) -> String {
        format!("{}/{}", self.events_url(), id)
    }
}

#[async_trait]
impl ChatGateway for DiscordClient {
    async fn create_event(&self, draft: &ChatEventDraft) -> Result<String> {
        let request = self
            .http
            .request(Method::POST, self.events_url())
            .json(&EventPayload::from_draft(draft));
        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!("chat create failed ({status}): {body}")));
        }
        let created: CreatedEvent = response
            .json()
            .await
            .map_err(|err| SyncError::InvalidInput(format!("unparseable create reply: {err}")))?;
        Ok(created.id)
    }

    async fn update_event(&self, id: &str, draft: &ChatEventDraft) -> Result<()> {
        let request = self
            .http
            .request(Method::PATCH, self.event_url(id))
            .json(&EventPayload::from_draft(draft));
        let response = self.http.send(request).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(format!("chat event {id}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!("chat update failed ({status}): {body}")));
        }
        Ok(())
    }

    async fn delete_event(&self, id: &str) -> Result<()> {
        let request = self.http.request(Method::DELETE, self.event_url(id));
        let response = self.http.send(request).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(format!("chat event {id}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!("chat delete failed ({status}): {body}")));
        }
        Ok(())
    }

    async fn list_events(&self) -> Result<Vec<ChatScheduledEvent>> {
        let request = self.http.request(Method::GET, self.events_url());
        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!("chat listing failed ({status}): {body}")));
        }
        let raw: Vec<RawScheduledEvent> = response
            .json()
            .await
            .map_err(|err| SyncError::InvalidInput(format!("unparseable chat listing: {err}")))?;
        Ok(raw.into_iter().map(RawScheduledEvent::into_domain).collect())
    }
}

#[derive(Debug, Serialize)]
struct EventPayload {
    name: String,
    description: String,
    privacy_level: u8,
    entity_type: u8,
    scheduled_start_time: String,
    scheduled_end_time: String,
    entity_metadata: EntityMetadata,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct EntityMetadata {
    #[serde(default)]
    location: Option<String>,
}

impl EventPayload {
    fn from_draft(draft: &ChatEventDraft) -> Self {
        Self {
            name: draft.name.clone(),
            description: draft.description.clone(),
            privacy_level: PRIVACY_GUILD_ONLY,
            entity_type: ENTITY_TYPE_EXTERNAL,
            scheduled_start_time: to_iso_utc(draft.start),
            scheduled_end_time: to_iso_utc(draft.end),
            entity_metadata: EntityMetadata { location: Some(draft.location.clone()) },
        }
    }
}

fn to_iso_utc(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawScheduledEvent {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    scheduled_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    scheduled_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    creator_id: Option<String>,
    #[serde(default)]
    entity_metadata: Option<EntityMetadata>,
}

impl RawScheduledEvent {
    fn into_domain(self) -> ChatScheduledEvent {
        ChatScheduledEvent {
            id: self.id,
            name: self.name,
            description: self.description,
            start: self.scheduled_start_time,
            end: self.scheduled_end_time,
            location: self.entity_metadata.and_then(|meta| meta.location),
            creator_id: self.creator_id.unwrap_or_default(),
            url: None,
        }
    }
}
