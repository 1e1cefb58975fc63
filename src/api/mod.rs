//! REST API layer: token issuance, system endpoints, OpenAPI document.
//!
//! The chat itself runs over WebSocket (see [`crate::ws`]); REST only hands
//! out tokens and reports service status.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api", handlers::routes())
        .merge(handlers::system::routes())
}
