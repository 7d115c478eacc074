//! Authentication models for the CrediLink auth server

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::IdentityResponse;
use crate::auth::normalize_address;

/// Authentication session backing a bearer token
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct AuthSession {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub jti: String,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request for a challenge nonce
#[derive(Debug, Deserialize, Validate)]
pub struct NonceRequest {
    #[validate(custom = "validate_wallet_address")]
    pub address: String,
}

/// Response containing the nonce the wallet must sign
#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

/// Request to verify a signed nonce
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(custom = "validate_wallet_address")]
    pub address: String,
    #[validate(length(min = 1))]
    pub signature: String,
    pub role: Option<String>,
    pub chain_id: Option<i64>,
}

/// Successful verification
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub identity: IdentityResponse,
    pub session_token: String,
    pub token_type: String,
    pub expires_in: i64,
    /// True when this verification registered a new identity
    pub created: bool,
}

/// Restored session
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub identity: IdentityResponse,
    pub expires_at: DateTime<Utc>,
}

/// Chain switch notification from the wallet
#[derive(Debug, Deserialize, Validate)]
pub struct ChainSwitchRequest {
    #[validate(range(min = 1))]
    pub chain_id: i64,
}

fn validate_wallet_address(address: &str) -> Result<(), ValidationError> {
    normalize_address(address)
        .map(|_| ())
        .map_err(|_| ValidationError::new("wallet_address"))
}
