//! Service layer: session lifecycle and message routing.
//!
//! [`ChatService`] drives each connection from handshake to cleanup and
//! hands inbound frames to the [`MessageRouter`].

pub mod chat_service;
pub mod message_router;

pub use chat_service::{ActiveSession, AuthenticatedSession, ChatService};
pub use message_router::{DispatchOutcome, MessageRouter};
