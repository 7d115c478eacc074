//! Authentication HTTP handlers
//!
//! Endpoints for the wallet challenge-response flow and session management.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::{
    NonceRequest, NonceResponse, Role, SessionResponse, VerifyRequest, VerifyResponse,
};
use crate::state::AppState;

/// POST /nonce - Issue a single-use nonce for the wallet to sign
pub async fn request_nonce(
    State(state): State<AppState>,
    payload: Result<Json<NonceRequest>, JsonRejection>,
) -> Result<Json<NonceResponse>, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    let nonce = state.challenge_service.request_challenge(&req.address).await?;

    Ok(Json(nonce))
}

/// POST /verify - Check the signed nonce, register or load the identity, open a session
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    // Parsed before the service call so a bad role leaves the nonce pending
    let role = req
        .role
        .as_deref()
        .map(str::parse::<Role>)
        .transpose()
        .map_err(ApiError::VerificationFailed)?;

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let login = state
        .challenge_service
        .verify_challenge(&req.address, &req.signature, role, req.chain_id, user_agent)
        .await?;

    Ok(Json(VerifyResponse {
        success: true,
        identity: login.identity.into(),
        session_token: login.session.token,
        token_type: "Bearer".to_string(),
        expires_in: state.challenge_service.session_ttl_seconds(),
        created: login.created,
    }))
}

/// GET /auth/session - Describe the caller's current session
pub async fn current_session(user: AuthenticatedUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        identity: user.identity.into(),
        expires_at: user.session.expires_at,
    })
}

/// POST /auth/logout - Revoke the current session
pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    state.challenge_service.logout(&user.session.jti).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/logout-all - Revoke every session of the caller's identity
pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<LogoutAllResponse>, ApiError> {
    let revoked_sessions = state
        .challenge_service
        .logout_all(user.identity.id)
        .await?;

    Ok(Json(LogoutAllResponse { revoked_sessions }))
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub revoked_sessions: u64,
}
