//! # chat-router
//!
//! Real-time session and group-messaging router over authenticated
//! WebSockets.
//!
//! Clients obtain a bearer token from `GET /api/auth/login`, open the chat
//! WebSocket with `?token=…`, and exchange JSON envelopes for private,
//! group, and broadcast delivery. Group membership is dynamic: groups are
//! created on demand and dissolved when their last member leaves or
//! disconnects.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)      login, health, version
//!     ├── WS Handler (ws/)          handshake, socket loop, envelope codec
//!     │
//!     ├── ChatService (service/)    session lifecycle
//!     ├── MessageRouter (service/)  per-envelope dispatch
//!     │
//!     ├── ConnectionRegistry (domain/)
//!     ├── GroupDirectory (domain/)
//!     │
//!     └── TokenValidator (auth/)    HS256 JWT
//! ```
//!
//! No state is persisted; everything lives for the lifetime of the process.

pub mod api;
pub mod app;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
