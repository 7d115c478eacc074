//! Profile HTTP handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::{ChainSwitchRequest, IdentityResponse, ProfileUpdate};
use crate::state::AppState;

/// PATCH /profile - Merge fields into the caller's profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let Json(fields) = payload?;

    let identity = state
        .challenge_service
        .update_profile(user.identity.id, fields)
        .await?;

    Ok(Json(identity.into()))
}

/// POST /profile/chain - Record that the caller's wallet switched chains
pub async fn switch_chain(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<ChainSwitchRequest>, JsonRejection>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    let identity = state
        .challenge_service
        .switch_chain(user.identity.id, req.chain_id)
        .await?;

    Ok(Json(identity.into()))
}

/// GET /identities/:id - Public view of an identity
pub async fn get_identity(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let Path(identity_id) = path?;
    let identity = state.challenge_service.get_identity(identity_id).await?;

    Ok(Json(identity.into()))
}
