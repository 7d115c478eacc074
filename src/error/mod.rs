//! Centralized API error handling for CrediLink
//!
//! This module provides a unified error type for API responses with proper
//! HTTP status code mapping and JSON error responses.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("No nonce for address: {0}")]
    NoNonceForAddress(String),

    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("{0}")]
    RoleConflict(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::TooManyRequests => "TooManyRequests",
            ApiError::ServiceUnavailable(_) => "ServiceUnavailable",
            ApiError::DatabaseError(_) => "DatabaseError",
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::NoNonceForAddress(_) => "NoNonceForAddress",
            ApiError::SignatureInvalid(_) => "SignatureInvalid",
            ApiError::VerificationFailed(_) => "VerificationFailed",
            ApiError::RoleConflict(_) => "RoleConflict",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::NoNonceForAddress(_) => StatusCode::BAD_REQUEST,
            ApiError::SignatureInvalid(_) => StatusCode::UNAUTHORIZED,
            ApiError::VerificationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::RoleConflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        // Log server errors
        match &self {
            ApiError::DatabaseError(_) | ApiError::ServiceUnavailable(_) => {
                tracing::error!(error = %message, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %message, code = %error_code, "Client error occurred");
            }
        }

        let mut response = (
            status,
            Json(ErrorResponse {
                error: ErrorDetails {
                    code: error_code.to_string(),
                    message,
                    details: None,
                },
            }),
        )
            .into_response();

        if matches!(self, ApiError::TooManyRequests) {
            response.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from_static("1"),
            );
        }

        response
    }
}

// Protocol errors map onto distinct wire codes so clients can tell a
// missing challenge from a bad signature.
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidWalletAddress(_) => ApiError::ValidationError(err.to_string()),
            AuthError::ChallengeExpiredOrMissing => ApiError::NoNonceForAddress(err.to_string()),
            AuthError::InvalidSignature(_) => ApiError::VerificationFailed(err.to_string()),
            AuthError::SignerMismatch { .. } => ApiError::SignatureInvalid(err.to_string()),
            AuthError::RoleConflict { .. } => ApiError::RoleConflict(err.to_string()),
            AuthError::IdentityNotFound => ApiError::NotFound(err.to_string()),
            AuthError::SessionNotFound | AuthError::TokenExpired | AuthError::TokenError(_) => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::DatabaseError(_) => ApiError::DatabaseError(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::ValidationError(err.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(err: PathRejection) -> Self {
        ApiError::ValidationError(err.body_text())
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;
