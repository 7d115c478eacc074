//! Profile routes

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers::profile;
use crate::state::AppState;

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", patch(profile::update_profile))
        .route("/profile/chain", post(profile::switch_chain))
        .route("/identities/:id", get(profile::get_identity))
}
