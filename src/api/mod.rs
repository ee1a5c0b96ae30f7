//! HTTP API server for the sprout gateway

pub mod health;
pub mod ingest;
pub mod poll;
pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::audio::PacingConfig;
use crate::db::{DbPool, DeviceRepo, TurnRepo};
use crate::llm::LanguageModel;
use crate::stream::StreamRegistry;
use crate::turn::Pipeline;
use crate::voice::{SpeechRecognizer, SpeechSynthesizer};
use crate::Result;

pub use poll::AlertBoard;

/// Shared state for API handlers
pub struct ApiState {
    pub db: DbPool,
    pub device_repo: DeviceRepo,
    pub turn_repo: TurnRepo,
    pub registry: Arc<StreamRegistry>,
    pub alerts: AlertBoard,
    pub pipeline: Arc<Pipeline>,
    /// Absent when no STT provider is configured; audio uploads then take
    /// the clarification path
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub pacing: PacingConfig,
}

impl ApiState {
    /// Assemble API state from collaborators
    #[must_use]
    pub fn new(
        db: DbPool,
        model: Arc<dyn LanguageModel>,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        pacing: PacingConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            device_repo: DeviceRepo::new(db.clone()),
            turn_repo: TurnRepo::new(db.clone()),
            db,
            registry: Arc::new(StreamRegistry::new()),
            alerts: AlertBoard::default(),
            pipeline: Arc::new(Pipeline::new(model)),
            recognizer,
            synthesizer,
            pacing,
        })
    }
}

/// Build the router with all routes
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .merge(ingest::router(Arc::clone(&state)))
        .merge(stream::router(Arc::clone(&state)))
        .merge(poll::router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server until interrupted
///
/// Also starts the stream-channel abandonment sweeper.
///
/// # Errors
///
/// Returns error if the server fails to bind or run
pub async fn serve(state: Arc<ApiState>, port: u16) -> Result<()> {
    StreamRegistry::spawn_sweeper(
        Arc::clone(&state.registry),
        Duration::from_secs(30),
        crate::stream::channel::ABANDON_TTL,
    );

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

    tracing::info!(port, "API server listening");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

    Ok(())
}

/// API-boundary errors
///
/// Internal stage failures never surface here; the only conditions a caller
/// sees are not-found, bad requests, and storage faults.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl From<crate::Error> for ApiError {
    fn from(e: crate::Error) -> Self {
        match e {
            crate::Error::NotFound(what) => Self::NotFound(what),
            crate::Error::Channel(what) => Self::Conflict(what),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody { code, message },
            }),
        )
            .into_response()
    }
}
