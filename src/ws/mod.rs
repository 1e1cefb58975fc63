//! WebSocket layer: handshake, per-connection socket loop, envelope codec.
//!
//! Clients connect to the configured WebSocket path (`/ws/chat` by default)
//! with `?token=<bearer>` and then exchange JSON envelopes.

pub mod connection;
pub mod handler;
pub mod messages;
