//! Progressive audio streaming endpoint
//!
//! One GET per conversation: the single consumer attaches to the stream
//! channel, and an assembler task feeds the response body in paced chunks.
//! Bytes start flowing (warm-start filler first) before generation has
//! finished. Dropping the connection drops the body stream, which cancels
//! the assembler and, through it, the producer.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt as _;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ApiError, ApiState};
use crate::audio::AudioStreamer;

/// Chunks buffered between the assembler and the HTTP body
///
/// Small so the assembler's pacing, not this buffer, governs delivery.
const BODY_BUFFER_CHUNKS: usize = 4;

/// Build the streaming router
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/v1/stream/{conversation_id}", get(stream))
        .with_state(state)
}

async fn stream(
    State(state): State<Arc<ApiState>>,
    Path(conversation_id): Path<String>,
) -> Result<Response, ApiError> {
    // Unknown or expired ids are the one failure surfaced to the caller
    let consumer = state.registry.attach(&conversation_id).await?;

    let (tx, rx) = mpsc::channel(BODY_BUFFER_CHUNKS);
    let streamer = AudioStreamer::new(Arc::clone(&state.synthesizer), state.pacing);
    let registry = Arc::clone(&state.registry);
    let id = conversation_id.clone();
    tokio::spawn(async move {
        let end = streamer.run(&id, consumer, tx).await;
        tracing::debug!(conversation = %id, ?end, "assembler finished");
        registry.close(&id).await;
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response())
}
