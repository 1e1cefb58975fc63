//! WebSocket connection loop.
//!
//! One task per socket. It forwards inbound text frames to the session,
//! drains the session's outbound queue in order, and honours server-side
//! close requests (for example when a newer login replaces this one).

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use crate::domain::{CloseRequest, ConnectionReceiver};
use crate::error::ChatError;
use crate::service::{AuthenticatedSession, ChatService};

/// Runs the read/write loop for an authenticated connection.
///
/// The session is released when the loop ends, whichever side closed it.
pub async fn run_connection(socket: WebSocket, service: &ChatService, session: AuthenticatedSession) {
    let (session, mut outbound) = service.activate(session);
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        // Close requests win over buffered inbound frames.
        tokio::select! {
            biased;

            changed = outbound.close.changed() => {
                if changed.is_err() {
                    break;
                }
                let request = outbound.close.borrow_and_update().clone();
                if let Some(request) = request {
                    close_with(&mut ws_tx, &mut outbound, request).await;
                    break;
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        session.handle_text(text.as_str());
                    }
                    Some(Ok(Message::Binary(_))) => {
                        session.reject(&ChatError::MalformedEnvelope(
                            "binary frames are not supported".to_string(),
                        ));
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(identity = %session.identity(), error = %e, "ws read failed");
                        break;
                    }
                }
            }
            frame = outbound.frames.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(Message::text(frame)).await.is_err() {
                    break;
                }
            }
        }
    }

    let identity = session.identity().clone();
    let session_id = session.claims().session_id().map(str::to_string);
    let cleaned = session.close();
    tracing::debug!(
        identity = %identity,
        session_id = session_id.as_deref().unwrap_or("-"),
        cleaned,
        "ws connection closed"
    );
}

/// Flushes frames already queued, then sends the close frame.
async fn close_with(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    outbound: &mut ConnectionReceiver,
    request: CloseRequest,
) {
    while let Ok(frame) = outbound.frames.try_recv() {
        if ws_tx.send(Message::text(frame)).await.is_err() {
            return;
        }
    }
    let frame = CloseFrame {
        code: request.code,
        reason: request.reason.into(),
    };
    if let Err(e) = ws_tx.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %e, "failed to send close frame");
    }
}
