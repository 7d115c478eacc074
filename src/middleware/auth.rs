//! Authentication middleware
//!
//! Extractor for session bearer tokens.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{ActiveSession, AuthError, ChallengeService};
use crate::error::ApiError;
use crate::models::IdentityRecord;

/// Caller authenticated by a live session token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub session: ActiveSession,
    pub identity: IdentityRecord,
}

/// Error response for authentication failures
#[derive(Debug, Serialize)]
struct AuthRejection {
    error: AuthRejectionDetails,
}

#[derive(Debug, Serialize)]
struct AuthRejectionDetails {
    code: String,
    message: String,
}

impl AuthRejection {
    fn new(code: &str, message: &str) -> Self {
        Self {
            error: AuthRejectionDetails {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// Extractor for authenticated users
///
/// Verifies the bearer token from the Authorization header, checks that its
/// session has not been revoked, and loads the identity it belongs to.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, {}", user.identity.display_name)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<ChallengeService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AuthRejection::new(
                        "MissingToken",
                        "Authorization header with Bearer token required",
                    )
                    .into_response()
                })?;

        let service = Arc::<ChallengeService>::from_ref(state);

        let (session, identity) = service
            .authenticate(bearer.token())
            .await
            .map_err(|e| match e {
                AuthError::TokenExpired => {
                    AuthRejection::new("TokenExpired", "Token has expired").into_response()
                }
                AuthError::TokenError(_) => {
                    AuthRejection::new("InvalidToken", "Invalid token").into_response()
                }
                AuthError::SessionNotFound | AuthError::IdentityNotFound => {
                    AuthRejection::new("SessionRevoked", "Session has been revoked")
                        .into_response()
                }
                other => ApiError::from(other).into_response(),
            })?;

        Ok(AuthenticatedUser { session, identity })
    }
}
