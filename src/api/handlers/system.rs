//! System endpoints: health check and version.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"healthy"` while the process serves requests.
    pub status: String,
    /// Server time, RFC 3339.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Number of live WebSocket sessions.
    pub active_sessions: usize,
    /// Number of existing groups.
    pub groups: usize,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp, and live session and group counts.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(
    State(state): State<AppState>,
) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_sessions: state.chat_service.connections().len(),
            groups: state.chat_service.groups().len(),
        }),
    )
}

/// `GET /v1/version` — Plain-text service version.
#[utoipa::path(
    get,
    path = "/v1/version",
    tag = "System",
    summary = "Service version",
    responses(
        (status = 200, description = "Name and version", body = String, content_type = "text/plain"),
    )
)]
pub async fn version_handler() -> &'static str {
    concat!("chat-router v", env!("CARGO_PKG_VERSION"))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/version", get(version_handler))
}
