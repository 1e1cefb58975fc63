//! HTTP application assembly: REST routes, WebSocket endpoint, middleware.

use std::time::Duration;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::get;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::ServerConfig;
use crate::ws::handler::ws_handler;

/// Builds the full application router for `state`.
///
/// The request timeout applies to REST routes only; WebSocket sessions are
/// long-lived and end when either side closes.
pub fn build_app(state: AppState, config: &ServerConfig) -> Router {
    let rest = api::build_router().layer(TimeoutLayer::new(Duration::from_secs(
        config.request_timeout_secs,
    )));

    let app = Router::new()
        .merge(rest)
        .route(&config.ws_path, get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        app.merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::openapi::ApiDoc::openapi()),
        )
    };

    app.layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    match &config.cors_allowed_origin {
        Some(origin) => CorsLayer::new()
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_origin(AllowOrigin::exact(origin.clone()))
            .max_age(Duration::from_secs(3600)),
        None => CorsLayer::permissive(),
    }
}
