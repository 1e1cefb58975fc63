//! Connection handles.
//!
//! A [`ConnectionHandle`] is the routing side of one WebSocket: a bounded
//! outbound queue drained by that socket's own task, plus a close signal.
//! Every delivery to a connection goes through its queue, so frames reach the
//! socket in the order they were enqueued regardless of how many concurrent
//! fan-outs target it.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

/// WebSocket close code for policy violations (RFC 6455 §7.4.1).
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Unique identifier of one physical connection.
///
/// Distinguishes successive connections that authenticate as the same
/// [`super::Identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-initiated close instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRequest {
    /// WebSocket close code.
    pub code: u16,
    /// Human-readable close reason.
    pub reason: String,
}

/// Cloneable sending side of a connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    frames: mpsc::Sender<String>,
    close: Arc<watch::Sender<Option<CloseRequest>>>,
}

/// Receiving side of a connection, owned by the socket task.
#[derive(Debug)]
pub struct ConnectionReceiver {
    /// Encoded outbound frames, in delivery order.
    pub frames: mpsc::Receiver<String>,
    /// Fires once when the server asks for this connection to be closed.
    pub close: watch::Receiver<Option<CloseRequest>>,
}

impl ConnectionHandle {
    /// Creates a new handle and its receiver with the given queue depth.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, ConnectionReceiver) {
        let (frames_tx, frames_rx) = mpsc::channel(capacity.max(1));
        let (close_tx, close_rx) = watch::channel(None);
        let handle = Self {
            id: ConnectionId::new(),
            frames: frames_tx,
            close: Arc::new(close_tx),
        };
        let receiver = ConnectionReceiver {
            frames: frames_rx,
            close: close_rx,
        };
        (handle, receiver)
    }

    /// Returns this connection's id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `true` while the socket task is alive and no close was requested.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.frames.is_closed() && self.close.borrow().is_none()
    }

    /// Returns `true` if both handles refer to the same physical connection.
    #[must_use]
    pub fn same_connection(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// Enqueues an encoded frame without waiting.
    ///
    /// Returns `false` if the connection is closed or its queue is full; in
    /// both cases the frame is dropped.
    pub fn send_text(&self, frame: String) -> bool {
        if !self.is_open() {
            return false;
        }
        match self.frames.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    frame_len = frame.len(),
                    "outbound queue full, dropping frame"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Asks the socket task to close the connection.
    ///
    /// Only the first request is kept. Frames already queued are still
    /// flushed before the close frame goes out.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        let request = CloseRequest {
            code,
            reason: reason.into(),
        };
        self.close.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(request);
            true
        });
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn send_text_reaches_receiver_in_order() {
        let (handle, mut rx) = ConnectionHandle::channel(8);
        assert!(handle.send_text("one".to_string()));
        assert!(handle.send_text("two".to_string()));
        assert_eq!(rx.frames.try_recv().ok().as_deref(), Some("one"));
        assert_eq!(rx.frames.try_recv().ok().as_deref(), Some("two"));
    }

    #[test]
    fn full_queue_drops_frame() {
        let (handle, _rx) = ConnectionHandle::channel(1);
        assert!(handle.send_text("first".to_string()));
        assert!(!handle.send_text("second".to_string()));
    }

    #[test]
    fn dropped_receiver_closes_handle() {
        let (handle, rx) = ConnectionHandle::channel(4);
        assert!(handle.is_open());
        drop(rx);
        assert!(!handle.is_open());
        assert!(!handle.send_text("late".to_string()));
    }

    #[test]
    fn close_request_is_observed_once() {
        let (handle, rx) = ConnectionHandle::channel(4);
        handle.close(CLOSE_POLICY_VIOLATION, "session replaced");
        handle.close(1000, "ignored");
        assert!(!handle.is_open());

        let Some(request) = rx.close.borrow().clone() else {
            panic!("close request expected");
        };
        assert_eq!(request.code, CLOSE_POLICY_VIOLATION);
        assert_eq!(request.reason, "session replaced");
    }

    #[test]
    fn clones_share_identity() {
        let (a, _rx_a) = ConnectionHandle::channel(1);
        let (b, _rx_b) = ConnectionHandle::channel(1);
        assert!(a.same_connection(&a.clone()));
        assert!(!a.same_connection(&b));
    }
}
