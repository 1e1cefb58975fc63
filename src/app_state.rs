//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::{JwtTokenService, TokenValidator};
use crate::config::ServerConfig;
use crate::domain::{ConnectionRegistry, GroupDirectory};
use crate::service::ChatService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session lifecycle and routing for WebSocket connections.
    pub chat_service: Arc<ChatService>,
    /// Token issuer backing the login endpoint.
    pub tokens: Arc<JwtTokenService>,
}

impl AppState {
    /// Builds fresh, empty stores and wires them to a token service derived
    /// from `config`.
    ///
    /// # Errors
    ///
    /// Fails if the configured JWT secret or token lifetime is rejected by
    /// [`JwtTokenService::new`].
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let tokens = Arc::new(JwtTokenService::new(
            &config.jwt_secret,
            config.token_ttl_secs,
        )?);
        let chat_service = Arc::new(ChatService::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(GroupDirectory::new()),
            Arc::clone(&tokens) as Arc<dyn TokenValidator>,
            config.outbound_queue_capacity,
        ));
        Ok(Self {
            chat_service,
            tokens,
        })
    }
}
