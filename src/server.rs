//! # HTTP surface
//!
//! | Route | Body | Reply |
//! |-------|------|-------|
//! | `GET /health` | none | `{status, timestamp}` |
//! | `POST /chat` | `{message, session_id?, patient_info?}` | `{reply, latency, session_id, stage}` |
//! | `POST /reset` | `{session_id?}` or nothing, any content type | `{message, session_id}` |
//!
//! Errors are `{"error": "..."}`: 400 for a blank message or unreadable body,
//! 500 for anything that fails inside the turn. CORS is fully permissive.
//!
//! [`serve`] warms the embedding cache before binding, so the first request
//! never pays for catalog embedding, and runs a background sweep that drops
//! idle sessions.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::chat_log::now_timestamp;
use crate::config::TriageConfig;
use crate::error::TriageError;
use crate::pipeline::{TriagePipeline, TurnReply};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<TriagePipeline>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub patient_info: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetReply {
    pub message: &'static str,
    /// `None` when the body could not be read and nothing was reset.
    pub session_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl From<TriageError> for ApiError {
    fn from(err: TriageError) -> Self {
        match err {
            TriageError::EmptyInput => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(detail) => {
                error!(detail, "Chat turn failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(pipeline: Arc<TriagePipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/reset", post(reset))
        .layer(CorsLayer::permissive())
        .with_state(AppState { pipeline })
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "timestamp": now_timestamp() }))
}

async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<TurnReply>, ApiError> {
    let Json(request) = body?;
    let patient_info = request.patient_info.unwrap_or_default();

    let reply = state
        .pipeline
        .handle_turn(&request.message, request.session_id.as_deref(), &patient_info)
        .await?;
    Ok(Json(reply))
}

/// Read a reset body regardless of content type. Empty or `null` means the
/// default session; anything unparseable yields `None`.
fn parse_reset_body(body: &[u8]) -> Option<ResetRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Some(ResetRequest::default());
    }
    match serde_json::from_slice::<Option<ResetRequest>>(body) {
        Ok(request) => Some(request.unwrap_or_default()),
        Err(err) => {
            warn!("Ignoring unreadable reset body: {}", err);
            None
        }
    }
}

async fn reset(State(state): State<AppState>, body: Bytes) -> Json<ResetReply> {
    let Some(request) = parse_reset_body(&body) else {
        return Json(ResetReply {
            message: "No session reset",
            session_id: None,
        });
    };
    let session_id = state.pipeline.reset(request.session_id.as_deref()).await;
    Json(ResetReply {
        message: "Session reset",
        session_id: Some(session_id),
    })
}

/// Periodically drop sessions idle longer than `ttl`.
pub fn spawn_session_sweeper(pipeline: Arc<TriagePipeline>, ttl: Duration) {
    let period = (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            pipeline.sessions().evict_expired().await;
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
    }
    info!("Shutting down");
}

/// Warm up, bind `config.bind_addr` and serve until Ctrl-C.
pub async fn serve(
    config: &TriageConfig,
    pipeline: Arc<TriagePipeline>,
) -> Result<(), Box<dyn Error>> {
    pipeline.research().warm_up().await?;
    spawn_session_sweeper(Arc::clone(&pipeline), config.session_ttl());

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Triage service listening on {}", listener.local_addr()?);

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
