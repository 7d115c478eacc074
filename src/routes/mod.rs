//! Route definitions for the CrediLink API

mod auth;
mod profile;

pub use auth::auth_routes;
pub use profile::profile_routes;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{self, RateLimiter};
use crate::state::AppState;

/// Build the full application router with its middleware stack
pub fn create_app(state: AppState, rate_limiter: RateLimiter, config: &Config) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(auth_routes())
        .merge(profile_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers));

    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    app.layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(axum::middleware::from_fn(middleware::rate_limit_layer(
            rate_limiter,
        )))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()))
}

async fn root() -> &'static str {
    "CrediLink Auth API"
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    version: &'static str,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    db::check_health(&state.db_pool)
        .await
        .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "healthy",
        database: "connected",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static("x-request-id")])
}
