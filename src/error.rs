//! Router error types with HTTP status code mapping.
//!
//! [`ChatError`] is the central error type. On the REST surface each variant
//! maps to an HTTP status and a structured JSON body; on a WebSocket session
//! the same variant is turned into an outbound `error` envelope addressed to
//! the originating connection.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All REST error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: username must not be empty",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Router error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status               |
/// |-----------|-------------------|---------------------------|
/// | 1000–1999 | Validation / wire | 400 Bad Request           |
/// | 2000–2999 | Lookup / state    | 404 Not Found / 403       |
/// | 3000–3999 | Server            | 500 Internal Server Error |
/// | 4000–4999 | Authentication    | 401 Unauthorized          |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Bearer token missing, malformed, expired, or wrongly signed.
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    /// No group with the given id exists.
    #[error("group does not exist: {0}")]
    GroupNotFound(String),

    /// The identity is not a member of the group.
    #[error("you are not in this group: {0}")]
    NotAGroupMember(String),

    /// Inbound frame could not be decoded into an envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Inbound envelope carried an unrecognized `type`.
    #[error("invalid message type: {0}")]
    UnknownMessageType(String),

    /// Private message target is not connected.
    #[error("failed to send message: receiver {0} is not active")]
    ReceiverUnreachable(String),

    /// Frame arrived on a connection that is no longer the identity's live
    /// session (superseded by a newer login, or already released).
    #[error("session is no longer active: {0}")]
    SessionClosed(String),

    /// REST request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::MalformedEnvelope(_) => 1002,
            Self::UnknownMessageType(_) => 1003,
            Self::GroupNotFound(_) => 2001,
            Self::NotAGroupMember(_) => 2002,
            Self::ReceiverUnreachable(_) => 2003,
            Self::Internal(_) => 3000,
            Self::AuthenticationFailure(_) => 4001,
            Self::SessionClosed(_) => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::MalformedEnvelope(_) | Self::UnknownMessageType(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::GroupNotFound(_) | Self::ReceiverUnreachable(_) => StatusCode::NOT_FOUND,
            Self::NotAGroupMember(_) => StatusCode::FORBIDDEN,
            Self::AuthenticationFailure(_) | Self::SessionClosed(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` if a session can keep going after this error.
    ///
    /// Authentication failures and superseded sessions end a connection.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::AuthenticationFailure(_) | Self::SessionClosed(_)
        )
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
