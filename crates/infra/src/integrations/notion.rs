//! Notion document-store gateway implementation
//!
//! Pages carry the event fields plus three plumbing columns: the calendar
//! event id, the reference (chat event id / foreign key) and the page's own
//! id, written back right after creation so operators can cross-reference
//! rows from the database view.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use crosscal_core::DocumentGateway;
use crosscal_domain::{
    DocDatabase, DocPage, DocPageDraft, DocPagePatch, DocStoreConfig, Result, SyncError,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::{json, Map, Value};

use crate::http::HttpClient;

const NOTION_VERSION: &str = "2022-06-28";

const PROP_TITLE: &str = "Name";
const PROP_BODY: &str = "Details";
const PROP_DATE: &str = "Date";
const PROP_REFERENCE: &str = "Reference ID";
const PROP_CREATOR: &str = "Creator ID";
const PROP_PAGE_ID: &str = "Page ID";
const PROP_EVENT_URL: &str = "Event URL";
const PROP_CALENDAR_EVENT_ID: &str = "Calendar Event ID";
const PROP_LOCATION: &str = "Location";

/// Notion API client
pub struct NotionClient {
    http: HttpClient,
    api_base: String,
    token: String,
    internal_db_id: String,
    external_db_id: Option<String>,
}

impl NotionClient {
    pub fn new(config: &DocStoreConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Notion-Version",
            HeaderValue::from_static(NOTION_VERSION),
        );
        let http = HttpClient::builder().default_headers(headers).build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            internal_db_id: config.internal_db_id.clone(),
            external_db_id: config.external_db_id.clone(),
        })
    }

    fn db_id(&self, db: DocDatabase) -> Result<&str> {
        match db {
            DocDatabase::Internal => Ok(&self.internal_db_id),
            DocDatabase::External => self
                .external_db_id
                .as_deref()
                .ok_or_else(|| SyncError::Config("external database not configured".into())),
        }
    }

    async fn query(&self, db: DocDatabase, filter: Value) -> Result<Vec<DocPage>> {
        let url = format!("{}/databases/{}/query", self.api_base, self.db_id(db)?);
        let request =
            self.http.request(Method::POST, url).bearer_auth(&self.token).json(&filter);
        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!("doc query failed ({status}): {body}")));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| SyncError::InvalidInput(format!("unparseable doc query reply: {err}")))?;
        let results = body.get("results").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(results.iter().filter_map(parse_page).collect())
    }

    async fn query_first_equals(
        &self,
        db: DocDatabase,
        property: &str,
        value: &str,
    ) -> Result<Option<DocPage>> {
        let filter = json!({
            "filter": {
                "property": property,
                "rich_text": {"equals": value}
            }
        });
        Ok(self.query(db, filter).await?.into_iter().next())
    }

    async fn patch_page(&self, page_id: &str, body: Value) -> Result<()> {
        let url = format!("{}/pages/{}", self.api_base, page_id);
        let request = self.http.request(Method::PATCH, url).bearer_auth(&self.token).json(&body);
        let response = self.http.send(request).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(format!("doc page {page_id}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!("doc patch failed ({status}): {text}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentGateway for NotionClient {
    async fn get_page(&self, page_id: &str) -> Result<Option<DocPage>> {
        let url = format!("{}/pages/{}", self.api_base, page_id);
        let request = self.http.request(Method::GET, url).bearer_auth(&self.token);
        let response = self.http.send(request).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!("doc fetch failed ({status}): {body}")));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| SyncError::InvalidInput(format!("unparseable doc page: {err}")))?;
        // An archived page counts as missing so dangling correlation
        // entries get repaired.
        Ok(parse_page(&body))
    }

    async fn find_by_calendar_id(
        &self,
        db: DocDatabase,
        calendar_id: &str,
    ) -> Result<Option<DocPage>> {
        self.query_first_equals(db, PROP_CALENDAR_EVENT_ID, calendar_id).await
    }

    async fn find_by_reference(
        &self,
        db: DocDatabase,
        reference_id: &str,
    ) -> Result<Option<DocPage>> {
        self.query_first_equals(db, PROP_REFERENCE, reference_id).await
    }

    async fn create_page(&self, db: DocDatabase, draft: &DocPageDraft) -> Result<String> {
        let url = format!("{}/pages", self.api_base);
        let body = json!({
            "parent": {"database_id": self.db_id(db)?},
            "properties": draft_properties(draft),
        });
        let request = self.http.request(Method::POST, url).bearer_auth(&self.token).json(&body);
        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!("doc create failed ({status}): {text}")));
        }
        let created: Value = response
            .json()
            .await
            .map_err(|err| SyncError::InvalidInput(format!("unparseable create reply: {err}")))?;
        let page_id = created
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::InvalidInput("create reply without page id".into()))?
            .to_string();

        // Reflect the page's own id into its Page ID column.
        let self_ref = json!({
            "properties": {PROP_PAGE_ID: rich_text_prop(&page_id)}
        });
        self.patch_page(&page_id, self_ref).await?;
        Ok(page_id)
    }

    async fn update_page(&self, page_id: &str, patch: &DocPagePatch) -> Result<()> {
        let properties = patch_properties(patch);
        if properties.is_empty() {
            return Ok(());
        }
        self.patch_page(page_id, json!({"properties": properties})).await
    }

    async fn archive_page(&self, page_id: &str) -> Result<()> {
        self.patch_page(page_id, json!({"archived": true})).await
    }

    async fn list_pages(&self, db: DocDatabase) -> Result<Vec<DocPage>> {
        self.query(db, json!({})).await
    }
}

fn draft_properties(draft: &DocPageDraft) -> Value {
    let mut properties = Map::new();
    properties.insert(PROP_TITLE.into(), title_prop(&draft.title));
    properties.insert(PROP_BODY.into(), rich_text_prop(&draft.body));
    properties.insert(PROP_DATE.into(), date_prop(draft.start, draft.end));
    properties.insert(PROP_CREATOR.into(), rich_text_prop(&draft.creator));
    properties.insert(
        PROP_REFERENCE.into(),
        rich_text_prop(draft.reference_id.as_deref().unwrap_or_default()),
    );
    properties.insert(PROP_PAGE_ID.into(), rich_text_prop(""));
    if let Some(calendar_event_id) = &draft.calendar_event_id {
        properties.insert(PROP_CALENDAR_EVENT_ID.into(), rich_text_prop(calendar_event_id));
    }
    if let Some(event_url) = &draft.event_url {
        properties.insert(PROP_EVENT_URL.into(), url_prop(event_url));
    }
    if let Some(location) = &draft.location {
        properties.insert(PROP_LOCATION.into(), rich_text_prop(location));
    }
    Value::Object(properties)
}

fn patch_properties(patch: &DocPagePatch) -> Map<String, Value> {
    let mut properties = Map::new();
    if let Some(title) = &patch.title {
        properties.insert(PROP_TITLE.into(), title_prop(title));
    }
    if let Some(body) = &patch.body {
        properties.insert(PROP_BODY.into(), rich_text_prop(body));
    }
    if let Some(start) = patch.start {
        properties.insert(PROP_DATE.into(), date_prop(start, patch.end));
    }
    if let Some(reference_id) = &patch.reference_id {
        properties.insert(PROP_REFERENCE.into(), rich_text_prop(reference_id));
    }
    if let Some(calendar_event_id) = &patch.calendar_event_id {
        properties.insert(PROP_CALENDAR_EVENT_ID.into(), rich_text_prop(calendar_event_id));
    }
    if let Some(event_url) = &patch.event_url {
        properties.insert(PROP_EVENT_URL.into(), url_prop(event_url));
    }
    if let Some(location) = &patch.location {
        properties.insert(PROP_LOCATION.into(), rich_text_prop(location));
    }
    properties
}

fn title_prop(text: &str) -> Value {
    json!({"title": [{"text": {"content": text}}]})
}

fn rich_text_prop(text: &str) -> Value {
    json!({"rich_text": [{"text": {"content": text}}]})
}

fn url_prop(url: &str) -> Value {
    json!({"url": url})
}

fn date_prop(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Value {
    match end {
        Some(end) => json!({"date": {"start": start.to_rfc3339(), "end": end.to_rfc3339()}}),
        None => json!({"date": {"start": start.to_rfc3339()}}),
    }
}

fn parse_page(value: &Value) -> Option<DocPage> {
    let id = value.get("id")?.as_str()?.to_string();
    if value.get("archived").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    let properties = value.get("properties");
    let (start, end) = properties
        .and_then(|props| props.get(PROP_DATE))
        .and_then(|prop| prop.get("date"))
        .map(|date| {
            (
                date.get("start").and_then(Value::as_str).and_then(parse_date_value),
                date.get("end").and_then(Value::as_str).and_then(parse_date_value),
            )
        })
        .unwrap_or((None, None));
    Some(DocPage {
        id,
        calendar_event_id: extract_rich_text(properties, PROP_CALENDAR_EVENT_ID),
        reference_id: extract_rich_text(properties, PROP_REFERENCE),
        start,
        end,
    })
}

fn extract_rich_text(properties: Option<&Value>, name: &str) -> Option<String> {
    let nodes = properties?.get(name)?.get("rich_text")?.as_array()?;
    let node = nodes.first()?;
    let text = node
        .get("plain_text")
        .and_then(Value::as_str)
        .or_else(|| node.get("text")?.get("content")?.as_str())?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_date_value(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date_time) = DateTime::parse_from_rfc3339(value) {
        return Some(date_time.with_timezone(&Utc));
    }
    // Date-only properties come back as YYYY-MM-DD.
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> NotionClient {
        NotionClient::new(&DocStoreConfig {
            token: "docs-token".into(),
            internal_db_id: "db-int".into(),
            external_db_id: Some("db-ext".into()),
            api_base: server.uri(),
        })
        .expect("client built")
    }

    fn page_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "archived": false,
            "properties": {
                "Date": {"date": {"start": "2024-03-01T10:00:00+09:00", "end": "2024-03-01T11:00:00+09:00"}},
                "Calendar Event ID": {"rich_text": [{"plain_text": "ev-1"}]},
                "Reference ID": {"rich_text": [{"plain_text": "chat-1"}]}
            }
        })
    }

    #[tokio::test]
    async fn find_by_calendar_id_sends_equals_filter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/databases/db-int/query"))
            .and(body_partial_json(json!({
                "filter": {"property": "Calendar Event ID", "rich_text": {"equals": "ev-1"}}
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"results": [page_json("p-1")]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let page =
            client(&server).find_by_calendar_id(DocDatabase::Internal, "ev-1").await.unwrap();

        let page = page.expect("page found");
        assert_eq!(page.id, "p-1");
        assert_eq!(page.calendar_event_id.as_deref(), Some("ev-1"));
        assert_eq!(page.reference_id.as_deref(), Some("chat-1"));
        assert_eq!(page.start, Some(Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap()));
    }

    #[tokio::test]
    async fn create_writes_page_then_its_own_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p-new"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/pages/p-new"))
            .and(body_partial_json(json!({
                "properties": {"Page ID": {"rich_text": [{"text": {"content": "p-new"}}]}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p-new"})))
            .expect(1)
            .mount(&server)
            .await;

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let draft = DocPageDraft {
            title: "Sprint Review".into(),
            body: "Demo".into(),
            start,
            end: Some(start + chrono::Duration::hours(1)),
            creator: "alice@example.com".into(),
            reference_id: None,
            calendar_event_id: Some("ev-1".into()),
            event_url: Some("https://calendar.example.com/ev-1".into()),
            location: Some("Room 3".into()),
        };
        let id = client(&server).create_page(DocDatabase::Internal, &draft).await.unwrap();
        assert_eq!(id, "p-new");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["parent"]["database_id"], "db-int");
        assert_eq!(
            body["properties"]["Name"]["title"][0]["text"]["content"],
            "Sprint Review"
        );
        assert_eq!(
            body["properties"]["Calendar Event ID"]["rich_text"][0]["text"]["content"],
            "ev-1"
        );
    }

    #[tokio::test]
    async fn archive_patches_archived_flag() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/pages/p-1"))
            .and(body_partial_json(json!({"archived": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p-1"})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).archive_page("p-1").await.unwrap();
    }

    #[tokio::test]
    async fn archived_page_reads_as_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/p-old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p-old",
                "archived": true,
                "properties": {}
            })))
            .mount(&server)
            .await;

        let page = client(&server).get_page("p-old").await.unwrap();
        assert!(page.is_none());
    }

    #[tokio::test]
    async fn external_queries_require_configuration() {
        let server = MockServer::start().await;
        let client = NotionClient::new(&DocStoreConfig {
            token: "docs-token".into(),
            internal_db_id: "db-int".into(),
            external_db_id: None,
            api_base: server.uri(),
        })
        .unwrap();

        let result = client.find_by_calendar_id(DocDatabase::External, "ev-1").await;
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[tokio::test]
    async fn empty_patch_sends_no_request() {
        let server = MockServer::start().await;

        client(&server).update_page("p-1", &DocPagePatch::default()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests.is_empty());
    }
}
