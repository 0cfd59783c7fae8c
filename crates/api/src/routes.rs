//! HTTP trigger surface
//!
//! Three inbound routes feed the engine: the calendar push-notification
//! webhook, a manual sync trigger with the same effect, and the
//! chat-platform event callback. Skipped passes (cooldown or in-progress)
//! report success to the caller since no actionable work was lost.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use crosscal_core::RunOutcome;
use crosscal_domain::constants::NOTIFICATION_TOKEN_PREFIX;
use crosscal_domain::ChatScheduledEvent;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::context::AppContext;

/// Build the application router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/calendar/webhook", post(calendar_webhook))
        .route("/calendar/sync", get(manual_sync).post(manual_sync))
        .route("/chat/events", post(chat_event))
        .route("/health", get(health))
        .with_state(ctx)
}

async fn health() -> &'static str {
    "ok"
}

/// Calendar push-notification receiver.
///
/// Notifications are delivered at-least-once; the duplicate guard drops
/// replays before they reach the coordinator. 204 on success or skip, 500
/// only when a pass actually ran and failed.
async fn calendar_webhook(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> StatusCode {
    let channel = header_str(&headers, "X-Goog-Channel-ID");
    let message_number = header_str(&headers, "X-Goog-Message-Number");
    let resource_state = header_str(&headers, "X-Goog-Resource-State");

    if let (Some(channel), Some(message_number)) = (channel, message_number) {
        let token = format!("{NOTIFICATION_TOKEN_PREFIX}:{channel}:{message_number}");
        match ctx.state.register_notification(&token).await {
            Ok(true) => {
                info!(%token, "duplicate change notification skipped");
                return StatusCode::NO_CONTENT;
            }
            Ok(false) => {}
            Err(err) => {
                // The guard is an optimisation; reconciliation is idempotent.
                warn!(error = %err, "duplicate guard unavailable; processing anyway");
            }
        }
    }

    info!(?channel, ?resource_state, "calendar change notification received");
    match ctx.run_sync("webhook").await {
        Ok(RunOutcome::Completed(summary)) if summary.is_clean() => StatusCode::NO_CONTENT,
        Ok(RunOutcome::Completed(summary)) => {
            error!(failed = summary.failed, "webhook-triggered pass had failures");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Ok(_) => StatusCode::NO_CONTENT,
        Err(err) => {
            error!(error = %err, "webhook-triggered pass failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Manual trigger with the same gate as the webhook.
async fn manual_sync(State(ctx): State<Arc<AppContext>>) -> (StatusCode, &'static str) {
    match ctx.run_sync("manual").await {
        Ok(RunOutcome::Completed(summary)) if !summary.is_clean() => {
            error!(failed = summary.failed, "manual pass had failures");
            (StatusCode::INTERNAL_SERVER_ERROR, "sync failed")
        }
        Ok(_) => (StatusCode::OK, "ok"),
        Err(err) => {
            error!(error = %err, "manual pass failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "sync failed")
        }
    }
}

/// A chat-platform scheduled-event change, delivered by the gateway bridge.
#[derive(Debug, Deserialize)]
pub struct ChatEventCallback {
    pub action: ChatEventAction,
    pub event: ChatScheduledEvent,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatEventAction {
    Created,
    Updated,
    Deleted,
}

async fn chat_event(
    State(ctx): State<Arc<AppContext>>,
    Json(callback): Json<ChatEventCallback>,
) -> StatusCode {
    let result = match callback.action {
        ChatEventAction::Created => ctx.inbound.event_created(&callback.event).await,
        ChatEventAction::Updated => ctx.inbound.event_updated(&callback.event).await,
        ChatEventAction::Deleted => ctx.inbound.event_deleted(&callback.event).await,
    };
    match result {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(err) => {
            error!(chat_event_id = %callback.event.id, error = %err,
                "chat event callback failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
