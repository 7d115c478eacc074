//! JWT session token generation and validation

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::IdentityRecord;

/// JWT-related errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// JWT claims for session tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity ID)
    pub sub: String,
    /// Wallet address
    pub wallet: String,
    /// Identity role
    pub role: String,
    /// JWT ID (for revocation)
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Generate a session token for an identity
///
/// # Arguments
/// * `identity` - The verified identity
/// * `jti` - Unique token identifier for revocation
/// * `secret` - JWT signing secret
/// * `ttl_seconds` - Token time-to-live in seconds
pub fn generate_session_token(
    identity: &IdentityRecord,
    jti: &str,
    secret: &str,
    ttl_seconds: i64,
) -> Result<String, JwtError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(ttl_seconds);

    let claims = Claims {
        sub: identity.id.to_string(),
        wallet: identity.address.clone(),
        role: identity.role.as_str().to_string(),
        jti: jti.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::EncodingFailed(e.to_string()))
}

/// Verify and decode a JWT token
///
/// # Returns
/// * `Ok(Claims)` if token is valid
/// * `Err(JwtError)` if validation fails
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::TokenExpired,
        _ => JwtError::DecodingFailed(e.to_string()),
    })?;

    Ok(token_data.claims)
}

/// Extract identity ID from claims
pub fn get_identity_id_from_claims(claims: &Claims) -> Result<Uuid, JwtError> {
    Uuid::parse_str(&claims.sub).map_err(|e| JwtError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use sqlx::types::Json;

    fn create_test_identity() -> IdentityRecord {
        IdentityRecord {
            id: Uuid::new_v4(),
            address: "0xabcabc0000000000000000000000000000001234".to_string(),
            role: Role::Student,
            display_name: "Student 0xabca...1234".to_string(),
            verified: true,
            ens_name: None,
            email: None,
            avatar: None,
            bio: None,
            skills: Json(Vec::new()),
            company: None,
            experience: None,
            wallet_type: Some("metamask".to_string()),
            chain_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_generate_session_token() {
        let identity = create_test_identity();
        let jti = Uuid::new_v4().to_string();
        let secret = "test-secret-key";

        let token = generate_session_token(&identity, &jti, secret, 900).unwrap();
        assert!(!token.is_empty());

        let claims = verify_token(&token, secret).unwrap();
        assert_eq!(claims.sub, identity.id.to_string());
        assert_eq!(claims.wallet, identity.address);
        assert_eq!(claims.role, "student");
        assert_eq!(claims.jti, jti);
        assert_eq!(get_identity_id_from_claims(&claims).unwrap(), identity.id);
    }

    #[test]
    fn test_invalid_token() {
        let result = verify_token("invalid.token.here", "test-secret-key");
        assert!(matches!(result, Err(JwtError::DecodingFailed(_))));
    }

    #[test]
    fn test_wrong_secret() {
        let identity = create_test_identity();
        let jti = Uuid::new_v4().to_string();

        let token = generate_session_token(&identity, &jti, "secret1", 900).unwrap();
        assert!(verify_token(&token, "secret2").is_err());
    }

    #[test]
    fn test_expired_token() {
        let identity = create_test_identity();
        let jti = Uuid::new_v4().to_string();

        let token = generate_session_token(&identity, &jti, "secret", -60).unwrap();
        assert_eq!(verify_token(&token, "secret").unwrap_err(), JwtError::TokenExpired);
    }
}
