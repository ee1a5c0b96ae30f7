//! Telemetry + query ingest
//!
//! Accepts a sensor snapshot, an optional typed query, and an optional
//! multipart audio upload. The turn itself runs asynchronously: the handler
//! opens a stream channel, spawns the pipeline producer, and returns the
//! conversation id and stream URL immediately so the pot can connect and
//! start playing while the reply is still being generated.

use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, ApiState};
use crate::turn::{Priority, SensorSnapshot, TurnState, CLARIFICATION_REPLY};

/// Build the ingest router
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/v1/ingest", post(ingest))
        .with_state(state)
}

/// Ingest query parameters, matching the pot firmware's request line
#[derive(Debug, Deserialize)]
pub struct IngestParams {
    pub device_id: String,
    pub temperature: f64,
    pub moisture: f64,
    pub light: f64,
    /// Typed query (simulator); audio uploads are transcribed instead
    pub query: Option<String>,
    /// Hardware event tag (e.g. `wake_word`, `low_moisture_alert`)
    pub event: Option<String>,
}

/// Immediate ingest response; audio follows on the stream URL
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub conversation_id: String,
    pub stream_url: String,
}

/// What speech recognition made of an upload
enum Recognized {
    /// No audio was uploaded
    NoAudio,
    /// A non-empty transcript
    Text(String),
    /// Silence, empty transcript, or a recognition failure
    Silent,
}

async fn ingest(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<IngestParams>,
    request: Request,
) -> Result<Json<IngestResponse>, ApiError> {
    let audio = read_audio_upload(request).await?;

    let device = state
        .device_repo
        .ensure(&params.device_id)
        .map_err(ApiError::from)?;

    // Telemetry archival is best-effort and never blocks the turn
    if let Err(e) = state.turn_repo.record_reading(
        &device.id,
        params.temperature,
        params.moisture,
        params.light,
        params.event.as_deref(),
    ) {
        tracing::warn!(device = %device.id, error = %e, "failed to record reading");
    }

    let recognized = match audio {
        None => Recognized::NoAudio,
        Some(audio) => transcribe_upload(&state, &audio).await,
    };

    // A typed query wins; otherwise use the transcript. Audio that produced
    // nothing usable forces the clarification path.
    let (query, needs_clarification) = match (params.query.clone(), recognized) {
        (Some(q), _) if !q.trim().is_empty() => (Some(q), false),
        (_, Recognized::Text(t)) => (Some(t), false),
        (_, Recognized::Silent) => (None, true),
        (_, Recognized::NoAudio) => (None, false),
    };

    let conversation_id = Uuid::new_v4().to_string();
    state
        .registry
        .open(&conversation_id)
        .await
        .map_err(ApiError::from)?;
    let publisher = state
        .registry
        .publisher(&conversation_id)
        .await
        .map_err(ApiError::from)?;

    let species_profile = state
        .device_repo
        .species_profile(&device.species)
        .unwrap_or_default()
        .map(|p| p.summarize());

    let sensors = SensorSnapshot {
        temperature: params.temperature,
        moisture: params.moisture,
        light: params.light,
    };
    let mut turn = TurnState::new(
        device.id.clone(),
        device.species.clone(),
        query,
        sensors,
        params.event.clone(),
    );

    // Producer task: runs the pipeline, completes the channel, then
    // archives. Archival is decoupled from delivery and continues even
    // after a cancelled stream.
    let task_state = Arc::clone(&state);
    let task_id = conversation_id.clone();
    tokio::spawn(async move {
        let result = if needs_clarification {
            task_state
                .pipeline
                .run_direct(&mut turn, CLARIFICATION_REPLY, &publisher)
                .await
        } else {
            task_state
                .pipeline
                .run(&mut turn, species_profile.as_deref(), &publisher)
                .await
        };
        publisher.complete();

        match result {
            Ok(()) => {}
            Err(crate::Error::Channel(_)) => {
                // Consumer went away; the turn was cancelled, not failed
                tracing::debug!(conversation = %task_id, "producer cancelled by disconnect");
            }
            Err(e) => {
                tracing::warn!(conversation = %task_id, error = %e, "producer error");
            }
        }

        if let Err(e) = task_state.turn_repo.archive(&task_id, &turn) {
            tracing::warn!(conversation = %task_id, error = %e, "turn archival failed");
        }

        // High-priority outcomes and explicit hardware alerts surface on
        // the polling endpoint.
        let alerting = turn.priority == Priority::High
            || turn.event.as_deref().is_some_and(|e| e.ends_with("_alert"));
        if alerting {
            task_state.alerts.post(&turn.device_id, &task_id).await;
        }
    });

    let stream_url = format!("/v1/stream/{conversation_id}");
    Ok(Json(IngestResponse {
        conversation_id,
        stream_url,
    }))
}

/// Pull the `audio` part out of a multipart body, if there is one
async fn read_audio_upload(request: Request) -> Result<Option<Vec<u8>>, ApiError> {
    let is_multipart = request
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));
    if !is_multipart {
        return Ok(None);
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart field: {e}")))?
    {
        if field.name() == Some("audio") {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read audio part: {e}")))?;
            return Ok(Some(data.to_vec()));
        }
    }

    Ok(None)
}

/// Run speech recognition over an upload
///
/// Recognition failures and silence are recovered identically: the turn
/// takes the clarification path rather than erroring.
async fn transcribe_upload(state: &ApiState, audio: &[u8]) -> Recognized {
    let Some(recognizer) = state.recognizer.as_ref() else {
        tracing::warn!("audio uploaded but no STT provider configured");
        return Recognized::Silent;
    };

    match recognizer.transcribe(audio).await {
        Ok(text) if !text.trim().is_empty() => Recognized::Text(text),
        Ok(_) => {
            tracing::debug!("transcription empty, treating as silence");
            Recognized::Silent
        }
        Err(e) => {
            tracing::warn!(error = %e, "transcription failed, asking for a repeat");
            Recognized::Silent
        }
    }
}
