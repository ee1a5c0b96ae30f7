//! Polling endpoint for clients that cannot hold a connection open
//!
//! High-priority turns and hardware alerts park a notification on a
//! per-device board. A poll reports whether anything is pending along with
//! a URL to fetch it; taking a notification consumes it, so each item is
//! served at most once.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use super::{ApiError, ApiState};

/// A parked notification for one device
#[derive(Debug, Clone)]
pub struct PendingAlert {
    pub conversation_id: String,
    pub posted_at: DateTime<Utc>,
}

/// Per-device board of pending notifications
///
/// At most one alert is parked per device; a newer one replaces it. The
/// board is the only shared state besides the stream registry, and keys
/// are fully independent.
#[derive(Clone, Default)]
pub struct AlertBoard {
    inner: Arc<Mutex<HashMap<String, PendingAlert>>>,
}

impl AlertBoard {
    /// Park a notification for a device
    pub async fn post(&self, device_id: &str, conversation_id: &str) {
        let alert = PendingAlert {
            conversation_id: conversation_id.to_string(),
            posted_at: Utc::now(),
        };
        let replaced = self
            .inner
            .lock()
            .await
            .insert(device_id.to_string(), alert);
        if let Some(old) = replaced {
            tracing::debug!(
                device = device_id,
                superseded = %old.conversation_id,
                "pending alert replaced"
            );
        }
    }

    /// Take the pending notification for a device, consuming it
    pub async fn take(&self, device_id: &str) -> Option<PendingAlert> {
        self.inner.lock().await.remove(device_id)
    }
}

/// Build the polling router
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/v1/device/{device_id}/poll", get(poll))
        .route("/v1/turns/{conversation_id}", get(fetch_turn))
        .with_state(state)
}

/// Poll response; `notification_url` is present only when something was
/// pending, and that item is now consumed
#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

async fn poll(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
) -> Json<PollResponse> {
    match state.alerts.take(&device_id).await {
        Some(alert) => Json(PollResponse {
            pending: true,
            notification_url: Some(format!("/v1/turns/{}", alert.conversation_id)),
            conversation_id: Some(alert.conversation_id),
        }),
        None => Json(PollResponse {
            pending: false,
            conversation_id: None,
            notification_url: None,
        }),
    }
}

/// Archived turn as served to polling clients
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub conversation_id: String,
    pub device_id: String,
    pub reply_text: String,
    pub mood: String,
    pub priority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
}

async fn fetch_turn(
    State(state): State<Arc<ApiState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<TurnResponse>, ApiError> {
    let turn = state.turn_repo.get(&conversation_id)?;
    Ok(Json(TurnResponse {
        conversation_id: turn.id,
        device_id: turn.device_id,
        reply_text: turn.reply_text,
        mood: turn.mood,
        priority: turn.priority,
        transcription: turn.transcription,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn take_consumes_at_most_once() {
        let board = AlertBoard::default();
        board.post("pot-1", "conv-1").await;

        let first = board.take("pot-1").await;
        assert_eq!(first.unwrap().conversation_id, "conv-1");
        assert!(board.take("pot-1").await.is_none());
    }

    #[tokio::test]
    async fn newer_alert_replaces_older() {
        let board = AlertBoard::default();
        board.post("pot-1", "conv-1").await;
        board.post("pot-1", "conv-2").await;

        assert_eq!(board.take("pot-1").await.unwrap().conversation_id, "conv-2");
        assert!(board.take("pot-1").await.is_none());
    }

    #[tokio::test]
    async fn devices_are_independent() {
        let board = AlertBoard::default();
        board.post("a", "conv-a").await;
        board.post("b", "conv-b").await;

        assert_eq!(board.take("b").await.unwrap().conversation_id, "conv-b");
        assert_eq!(board.take("a").await.unwrap().conversation_id, "conv-a");
    }
}
