//! Token issuance handler.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{LoginParams, LoginResponse};
use crate::app_state::AppState;
use crate::error::{ChatError, ErrorResponse};

/// `GET /api/auth/login` — Issue a session token.
///
/// # Errors
///
/// Returns [`ChatError::InvalidRequest`] when `username` or `contact` is
/// empty, or [`ChatError::Internal`] if signing fails.
#[utoipa::path(
    get,
    path = "/api/auth/login",
    tag = "Auth",
    summary = "Issue a session token",
    description = "Mints a signed bearer token for the given display name. The token is then passed as the `token` query parameter when opening the chat WebSocket.",
    params(LoginParams),
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Missing username or contact", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
) -> Result<impl IntoResponse, ChatError> {
    let username = params.username.trim();
    let contact = params.contact.trim();
    if username.is_empty() {
        return Err(ChatError::InvalidRequest(
            "username must not be empty".to_string(),
        ));
    }
    if contact.is_empty() {
        return Err(ChatError::InvalidRequest(
            "contact must not be empty".to_string(),
        ));
    }

    let issued = state.tokens.issue(username, contact)?;
    tracing::info!(identity = %username, "issued session token");

    Ok((StatusCode::OK, Json(LoginResponse::from(issued))))
}

/// Auth routes, mounted under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/login", get(login))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::app_state::AppState;
    use crate::auth::TokenValidator;
    use crate::config::ServerConfig;

    use super::*;

    fn app() -> (Router, AppState) {
        let Ok(state) = AppState::from_config(&ServerConfig::default()) else {
            panic!("state should build");
        };
        (
            crate::api::build_router().with_state(state.clone()),
            state,
        )
    }

    async fn get_status_and_body(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let Ok(request) = Request::builder().uri(uri).body(Body::empty()) else {
            panic!("request should build");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router is infallible");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn login_issues_a_token_the_validator_accepts() {
        let (app, state) = app();
        let (status, body) =
            get_status_and_body(app, "/api/auth/login?username=alice&contact=alice%40example.com")
                .await;
        assert_eq!(status, StatusCode::OK);

        let Ok(response) = serde_json::from_slice::<LoginResponse>(&body) else {
            panic!("body should be a login response");
        };
        assert_eq!(response.contact, "alice@example.com");

        let Ok((identity, claims)) = state.tokens.validate(&response.token) else {
            panic!("issued token should validate");
        };
        assert_eq!(identity.as_str(), "alice");
        assert_eq!(claims.session_id(), Some(response.useruniqueid.as_str()));
    }

    #[tokio::test]
    async fn login_rejects_missing_fields() {
        let (app, _) = app();
        let (status, _) = get_status_and_body(app.clone(), "/api/auth/login?contact=x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get_status_and_body(app, "/api/auth/login?username=bob").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let Ok(json) = serde_json::from_slice::<serde_json::Value>(&body) else {
            panic!("error body should be JSON");
        };
        assert_eq!(json["error"]["code"], 1001);
    }
}
