// Module: http
// Read-path HTTP/JSON REST API over the catalog's services.

pub mod error;
pub mod health;
pub mod metrics_middleware;
pub mod openapi;
pub mod recommend;
pub mod search;
pub mod state;
pub mod tasks;
pub mod videos;

use axum::{
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::{AppError, AppResult};
pub use state::AppState;

/// Build the full router from an already-initialized `AppState`.
#[must_use]
pub fn create_router(state: AppState) -> axum::Router {
    let router = register_all_routes(&state);
    apply_global_layers(router, &state)
}

/// Assemble all route groups into a single router.
fn register_all_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .merge(health::create_health_router())
        .merge(videos::router())
        .merge(search::router())
        .merge(recommend::router())
        .merge(tasks::router());

    if state.config.server.development_mode {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
    } else {
        router
    }
}

/// Build CORS layer based on configuration.
fn build_cors_layer(config: &catalog_core::Config) -> CorsLayer {
    if config.server.development_mode {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else if config.server.cors_allowed_origins.is_empty() {
        tracing::warn!(
            "CORS: no allowed origins configured in production; all cross-origin requests will be denied. \
             Set server.cors_allowed_origins to allow specific origins."
        );
        CorsLayer::new()
    } else {
        let origins: Vec<HeaderValue> = config
            .server
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        tracing::info!(origins = ?origins, "CORS: configured with {} allowed origin(s)", origins.len());
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
            .allow_headers([axum::http::header::AUTHORIZATION, axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
    }
}

/// Apply global middleware layers (CORS, body limit, timeout, tracing) and bind state.
fn apply_global_layers(router: Router<AppState>, state: &AppState) -> axum::Router {
    let cors = build_cors_layer(&state.config);

    router
        .layer(cors)
        .layer(axum::extract::DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(TimeoutLayer::with_status_code(axum::http::StatusCode::REQUEST_TIMEOUT, std::time::Duration::from_secs(30)))
        .layer(axum_middleware::from_fn(metrics_middleware::metrics_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone())
}
