//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use utoipa::IntoParams;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::CLOSE_POLICY_VIOLATION;
use crate::error::ChatError;

/// Close reason sent when the handshake token is rejected.
pub const AUTH_FAILED_REASON: &str = "authentication failed";

/// Query parameters of the WebSocket handshake.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HandshakeParams {
    /// Bearer token issued by the login endpoint.
    pub token: Option<String>,
}

/// `GET /ws/chat?token=…` — Upgrade to a chat session.
///
/// The upgrade always completes; an unauthenticated socket is closed right
/// away with a policy-violation close code and is never registered.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HandshakeParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let service = Arc::clone(&state.chat_service);

    ws.on_upgrade(move |socket| async move {
        match service.authenticate(params.token.as_deref()) {
            Ok(session) => run_connection(socket, &service, session).await,
            Err(err) => reject_handshake(socket, &err).await,
        }
    })
}

async fn reject_handshake(mut socket: WebSocket, err: &ChatError) {
    tracing::warn!(error = %err, "rejecting websocket handshake");
    let frame = CloseFrame {
        code: CLOSE_POLICY_VIOLATION,
        reason: AUTH_FAILED_REASON.into(),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %e, "failed to send close frame");
    }
}
