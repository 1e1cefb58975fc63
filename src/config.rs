//! Server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Unset or unparsable values fall back to
//! the defaults listed on each field.

use std::net::SocketAddr;

use anyhow::Context;
use axum::http::HeaderValue;

/// Signing secret used when `JWT_SECRET` is unset. Only fit for local runs.
pub const DEVELOPMENT_JWT_SECRET: &str = "chat-router-development-secret-change-me";

/// Top-level server configuration.
///
/// Loaded once at startup via [`ServerConfig::from_env`].
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address to bind the HTTP server to (default `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// HS256 secret for session tokens (`JWT_SECRET`).
    pub jwt_secret: String,

    /// Lifetime of issued tokens in seconds (default 3600).
    pub token_ttl_secs: u64,

    /// Depth of each connection's outbound frame queue (default 256).
    pub outbound_queue_capacity: usize,

    /// Path the WebSocket endpoint is mounted on (default `/ws/chat`).
    pub ws_path: String,

    /// Single allowed CORS origin; `None` means permissive CORS.
    pub cors_allowed_origin: Option<HeaderValue>,

    /// Timeout applied to REST requests, in seconds (default 30).
    pub request_timeout_secs: u64,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("outbound_queue_capacity", &self.outbound_queue_capacity)
            .field("ws_path", &self.ws_path)
            .field("cors_allowed_origin", &self.cors_allowed_origin)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
            token_ttl_secs: 3600,
            outbound_queue_capacity: 256,
            ws_path: "/ws/chat".to_string(),
            cors_allowed_origin: None,
            request_timeout_secs: 30,
            log_json: false,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` or `CORS_ALLOWED_ORIGIN` is set but
    /// malformed, or if `WS_PATH` does not start with `/`.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid LISTEN_ADDR: {raw}"))?,
            Err(_) => defaults.listen_addr,
        };

        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.jwt_secret);

        let ws_path = std::env::var("WS_PATH").unwrap_or(defaults.ws_path);
        if !ws_path.starts_with('/') {
            anyhow::bail!("WS_PATH must start with '/': {ws_path}");
        }

        let cors_allowed_origin = match std::env::var("CORS_ALLOWED_ORIGIN") {
            Ok(raw) if !raw.is_empty() => Some(
                HeaderValue::from_str(&raw)
                    .with_context(|| format!("invalid CORS_ALLOWED_ORIGIN: {raw}"))?,
            ),
            _ => None,
        };

        Ok(Self {
            listen_addr,
            jwt_secret,
            token_ttl_secs: parse_env("TOKEN_TTL_SECS", defaults.token_ttl_secs),
            outbound_queue_capacity: parse_env(
                "OUTBOUND_QUEUE_CAPACITY",
                defaults.outbound_queue_capacity,
            ),
            ws_path,
            cors_allowed_origin,
            request_timeout_secs: parse_env(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            log_json: parse_env_bool("LOG_JSON", defaults.log_json),
        })
    }

    /// Whether tokens are signed with the built-in development secret.
    #[must_use]
    pub fn uses_development_secret(&self) -> bool {
        self.jwt_secret == DEVELOPMENT_JWT_SECRET
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
