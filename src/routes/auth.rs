//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::state::AppState;

/// Challenge-response and session routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/nonce", post(auth::request_nonce))
        .route("/verify", post(auth::verify))
        .route("/auth/session", get(auth::current_session))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logout-all", post(auth::logout_all))
}
