//! Login request and response shapes.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::IssuedToken;

/// Query parameters for `GET /api/auth/login`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct LoginParams {
    /// Display name; becomes the session identity.
    #[serde(default)]
    pub username: String,
    /// Free-form contact string echoed in the token claims.
    #[serde(default)]
    pub contact: String,
}

/// Token issued by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token to present as `?token=` on the WebSocket handshake.
    pub token: String,
    /// Contact string embedded in the token.
    pub contact: String,
    /// Session-unique id embedded in the token.
    pub useruniqueid: String,
}

impl From<IssuedToken> for LoginResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            contact: issued.contact,
            useruniqueid: issued.session_id,
        }
    }
}
