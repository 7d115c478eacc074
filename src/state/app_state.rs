//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::auth::ChallengeService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub challenge_service: Arc<ChallengeService>,
    pub db_pool: SqlitePool,
}

impl AppState {
    pub fn new(challenge_service: Arc<ChallengeService>, db_pool: SqlitePool) -> Self {
        Self {
            challenge_service,
            db_pool,
        }
    }
}

impl FromRef<AppState> for Arc<ChallengeService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.challenge_service.clone()
    }
}
