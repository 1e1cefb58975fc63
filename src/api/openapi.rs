//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use crate::api::dto::LoginResponse;
use crate::api::handlers::{auth, system};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI description, served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "chat-router",
        description = "Token issuance and status endpoints. Chat traffic itself flows over the WebSocket at `/ws/chat?token=<token>`."
    ),
    paths(auth::login, system::health_handler, system::version_handler),
    components(schemas(LoginResponse, ErrorResponse, ErrorBody, system::HealthResponse)),
    tags(
        (name = "Auth", description = "Session token issuance"),
        (name = "System", description = "Health and version"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_rest_path() {
        let doc = ApiDoc::openapi();
        for path in ["/api/auth/login", "/health", "/v1/version"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
