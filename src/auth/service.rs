//! Challenge service
//!
//! Core business logic for wallet-based authentication: issue a nonce,
//! check the wallet's signature over it, then register or load the identity
//! and open a session.

use thiserror::Error;
use uuid::Uuid;

use crate::identity::{IdentityRegistry, RegistryError};
use crate::models::{IdentityClaim, IdentityRecord, NonceResponse, ProfileUpdate, Role};

use super::crypto::{addresses_match, normalize_address, recover_signer};
use super::jwt::JwtError;
use super::nonce::{NonceError, NonceStore};
use super::session::{ActiveSession, IssuedSession, SessionError, SessionStore};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid wallet address: {0}")]
    InvalidWalletAddress(String),

    #[error("No pending challenge for this address; request a new nonce")]
    ChallengeExpiredOrMissing,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signature was produced by {recovered}, not {claimed}")]
    SignerMismatch { claimed: String, recovered: String },

    #[error("This wallet is already registered as a {existing}. Please log in with that role.")]
    RoleConflict { address: String, existing: Role },

    #[error("Identity not found")]
    IdentityNotFound,

    #[error("Session not found or revoked")]
    SessionNotFound,

    #[error("Session token expired")]
    TokenExpired,

    #[error("Token error: {0}")]
    TokenError(String),
}

impl From<RegistryError> for AuthError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::RoleConflict { address, existing } => {
                AuthError::RoleConflict { address, existing }
            }
            RegistryError::NotFound => AuthError::IdentityNotFound,
            RegistryError::DatabaseError(msg) => AuthError::DatabaseError(msg),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::SessionNotFound => AuthError::SessionNotFound,
            SessionError::TokenError(JwtError::TokenExpired) => AuthError::TokenExpired,
            SessionError::TokenError(e) => AuthError::TokenError(e.to_string()),
            SessionError::DatabaseError(msg) => AuthError::DatabaseError(msg),
        }
    }
}

/// Result of a successful `verify_challenge`
#[derive(Debug, Clone)]
pub struct VerifiedLogin {
    pub identity: IdentityRecord,
    /// True when this login registered the identity
    pub created: bool,
    pub session: IssuedSession,
}

/// Challenge-response authentication service
#[derive(Clone)]
pub struct ChallengeService {
    nonces: NonceStore,
    registry: IdentityRegistry,
    sessions: SessionStore,
}

impl ChallengeService {
    pub fn new(nonces: NonceStore, registry: IdentityRegistry, sessions: SessionStore) -> Self {
        Self {
            nonces,
            registry,
            sessions,
        }
    }

    /// Issue a nonce for `address` to sign
    ///
    /// Any challenge already pending for the address is replaced.
    pub async fn request_challenge(&self, address: &str) -> Result<NonceResponse, AuthError> {
        let identity_key = normalize_address(address)
            .map_err(|e| AuthError::InvalidWalletAddress(e.to_string()))?;

        let nonce = self.nonces.issue(&identity_key).await;

        tracing::info!(address = %identity_key, "Issued authentication challenge");

        Ok(NonceResponse {
            nonce: nonce.value,
            expires_at: nonce.expires_at,
        })
    }

    /// Verify the wallet's signature over its pending nonce
    ///
    /// The nonce is consumed before the signature is checked, so every
    /// outcome ends the attempt and a retry needs a fresh challenge.
    /// Without an explicit `role`, a returning wallet keeps its registered
    /// role and a new wallet registers as a student.
    pub async fn verify_challenge(
        &self,
        address: &str,
        signature: &str,
        role: Option<Role>,
        chain_id: Option<i64>,
        user_agent: Option<String>,
    ) -> Result<VerifiedLogin, AuthError> {
        let identity_key = normalize_address(address)
            .map_err(|e| AuthError::InvalidWalletAddress(e.to_string()))?;

        let nonce = self
            .nonces
            .consume(&identity_key)
            .await
            .map_err(|e| match e {
                NonceError::NotFound => AuthError::ChallengeExpiredOrMissing,
            })?;

        let recovered = recover_signer(&nonce, signature).map_err(|e| {
            tracing::warn!(address = %identity_key, error = %e, "Signature recovery failed");
            AuthError::InvalidSignature(e.to_string())
        })?;

        if !addresses_match(&recovered, &identity_key) {
            tracing::warn!(
                address = %identity_key,
                recovered = %recovered,
                "Signature signer does not match claimed address"
            );
            return Err(AuthError::SignerMismatch {
                claimed: identity_key,
                recovered,
            });
        }

        let role = match role {
            Some(role) => role,
            None => self
                .registry
                .find_by_address(&identity_key)
                .await?
                .first()
                .map(|record| record.role)
                .unwrap_or(Role::Student),
        };

        let claim = IdentityClaim::new(identity_key, role);
        let (identity, created) = self.registry.find_or_create(&claim, chain_id).await?;

        let session = self.sessions.open(&identity, user_agent).await?;

        tracing::info!(
            address = %identity.address,
            role = %identity.role,
            identity_id = %identity.id,
            created,
            "Wallet authenticated"
        );

        Ok(VerifiedLogin {
            identity,
            created,
            session,
        })
    }

    /// Resolve a bearer token to its session and identity
    pub async fn authenticate(
        &self,
        token: &str,
    ) -> Result<(ActiveSession, IdentityRecord), AuthError> {
        let session = self.sessions.resolve(token).await?;
        let identity = self.registry.get(session.identity_id).await?;
        Ok((session, identity))
    }

    /// End one session; the identity record is left as is
    pub async fn logout(&self, jti: &str) -> Result<(), AuthError> {
        self.sessions.revoke(jti).await?;
        tracing::info!(jti = %jti, "Session revoked");
        Ok(())
    }

    /// End every session of an identity
    pub async fn logout_all(&self, identity_id: Uuid) -> Result<u64, AuthError> {
        let revoked = self.sessions.revoke_all(identity_id).await?;
        tracing::info!(identity_id = %identity_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Get an identity by ID
    pub async fn get_identity(&self, identity_id: Uuid) -> Result<IdentityRecord, AuthError> {
        Ok(self.registry.get(identity_id).await?)
    }

    /// Merge profile fields into an identity
    pub async fn update_profile(
        &self,
        identity_id: Uuid,
        fields: ProfileUpdate,
    ) -> Result<IdentityRecord, AuthError> {
        Ok(self.registry.update(identity_id, fields).await?)
    }

    /// Record a wallet chain switch
    pub async fn switch_chain(
        &self,
        identity_id: Uuid,
        chain_id: i64,
    ) -> Result<IdentityRecord, AuthError> {
        Ok(self.registry.switch_chain(identity_id, chain_id).await?)
    }

    /// Session lifetime in seconds
    pub fn session_ttl_seconds(&self) -> i64 {
        self.sessions.ttl_seconds()
    }

    /// Nonce store handle (for the purge task)
    pub fn nonces(&self) -> &NonceStore {
        &self.nonces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::crypto::address_from_verifying_key;
    use crate::db::memory_pool;
    use alloy_primitives::eip191_hash_message;
    use k256::ecdsa::SigningKey;

    async fn service() -> ChallengeService {
        let pool = memory_pool().await.unwrap();
        ChallengeService::new(
            NonceStore::new(300),
            IdentityRegistry::new(pool.clone()),
            SessionStore::new(pool, "service-test-secret".to_string(), 3600),
        )
    }

    fn wallet() -> (SigningKey, String) {
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let address = address_from_verifying_key(key.verifying_key());
        (key, address)
    }

    fn sign(key: &SigningKey, message: &str) -> String {
        let prehash = eip191_hash_message(message.as_bytes());
        let (signature, recovery_id) = key.sign_prehash_recoverable(prehash.as_slice()).unwrap();
        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }

    #[tokio::test]
    async fn test_happy_path_creates_verified_identity() {
        let service = service().await;
        let (key, address) = wallet();
        // Wallets report checksummed, mixed-case addresses
        let claimed = address.to_uppercase().replacen("0X", "0x", 1);

        let challenge = service.request_challenge(&claimed).await.unwrap();
        let signature = sign(&key, &challenge.nonce);

        let login = service
            .verify_challenge(&claimed, &signature, Some(Role::Student), Some(1), None)
            .await
            .unwrap();

        assert!(login.created);
        assert!(login.identity.verified);
        assert_eq!(login.identity.address, address);
        assert_eq!(login.identity.role, Role::Student);

        let (session, identity) = service.authenticate(&login.session.token).await.unwrap();
        assert_eq!(identity.id, login.identity.id);
        assert_eq!(session.jti, login.session.jti);
    }

    #[tokio::test]
    async fn test_never_requested_is_missing_challenge() {
        let service = service().await;
        let (key, address) = wallet();

        let result = service
            .verify_challenge(&address, &sign(&key, "anything"), None, None, None)
            .await;

        assert!(matches!(result, Err(AuthError::ChallengeExpiredOrMissing)));
    }

    #[tokio::test]
    async fn test_replay_after_success_fails() {
        let service = service().await;
        let (key, address) = wallet();

        let challenge = service.request_challenge(&address).await.unwrap();
        let signature = sign(&key, &challenge.nonce);

        service
            .verify_challenge(&address, &signature, None, None, None)
            .await
            .unwrap();
        let replay = service
            .verify_challenge(&address, &signature, None, None, None)
            .await;

        assert!(matches!(replay, Err(AuthError::ChallengeExpiredOrMissing)));
    }

    #[tokio::test]
    async fn test_wrong_signer_is_mismatch_and_burns_nonce() {
        let service = service().await;
        let (_, address) = wallet();
        let (other_key, _) = wallet();

        let challenge = service.request_challenge(&address).await.unwrap();
        let result = service
            .verify_challenge(&address, &sign(&other_key, &challenge.nonce), None, None, None)
            .await;
        assert!(matches!(result, Err(AuthError::SignerMismatch { .. })));

        let retry = service
            .verify_challenge(&address, &sign(&other_key, &challenge.nonce), None, None, None)
            .await;
        assert!(matches!(retry, Err(AuthError::ChallengeExpiredOrMissing)));
    }

    #[tokio::test]
    async fn test_malformed_signature_is_invalid() {
        let service = service().await;
        let (_, address) = wallet();

        service.request_challenge(&address).await.unwrap();
        let result = service
            .verify_challenge(&address, "0x1234", None, None, None)
            .await;

        assert!(matches!(result, Err(AuthError::InvalidSignature(_))));
    }

    #[tokio::test]
    async fn test_superseded_nonce_rejected() {
        let service = service().await;
        let (key, address) = wallet();

        let first = service.request_challenge(&address).await.unwrap();
        let second = service.request_challenge(&address).await.unwrap();

        let stale = service
            .verify_challenge(&address, &sign(&key, &first.nonce), None, None, None)
            .await;
        assert!(matches!(
            stale,
            Err(AuthError::SignerMismatch { .. }) | Err(AuthError::InvalidSignature(_))
        ));

        // The stale attempt consumed the live nonce too
        let fresh = service
            .verify_challenge(&address, &sign(&key, &second.nonce), None, None, None)
            .await;
        assert!(matches!(fresh, Err(AuthError::ChallengeExpiredOrMissing)));
    }

    #[tokio::test]
    async fn test_role_conflict_creates_nothing() {
        let service = service().await;
        let (key, address) = wallet();

        let challenge = service.request_challenge(&address).await.unwrap();
        service
            .verify_challenge(
                &address,
                &sign(&key, &challenge.nonce),
                Some(Role::Recruiter),
                None,
                None,
            )
            .await
            .unwrap();

        let challenge = service.request_challenge(&address).await.unwrap();
        let result = service
            .verify_challenge(
                &address,
                &sign(&key, &challenge.nonce),
                Some(Role::Student),
                None,
                None,
            )
            .await;

        match result {
            Err(AuthError::RoleConflict { existing, .. }) => assert_eq!(existing, Role::Recruiter),
            other => panic!("expected role conflict, got {:?}", other.map(|l| l.identity.id)),
        }
        assert_eq!(
            service.registry.find_by_address(&address).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_returning_wallet_keeps_role_without_explicit_role() {
        let service = service().await;
        let (key, address) = wallet();

        let challenge = service.request_challenge(&address).await.unwrap();
        let first = service
            .verify_challenge(
                &address,
                &sign(&key, &challenge.nonce),
                Some(Role::Recruiter),
                None,
                None,
            )
            .await
            .unwrap();

        let challenge = service.request_challenge(&address).await.unwrap();
        let second = service
            .verify_challenge(&address, &sign(&key, &challenge.nonce), None, None, None)
            .await
            .unwrap();

        assert!(!second.created);
        assert_eq!(second.identity.id, first.identity.id);
        assert_eq!(second.identity.role, Role::Recruiter);
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let service = service().await;
        assert!(matches!(
            service.request_challenge("0x123").await,
            Err(AuthError::InvalidWalletAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_session_token() {
        let pool = memory_pool().await.unwrap();
        let service = ChallengeService::new(
            NonceStore::new(300),
            IdentityRegistry::new(pool.clone()),
            SessionStore::new(pool, "service-test-secret".to_string(), -60),
        );
        let (key, address) = wallet();

        let challenge = service.request_challenge(&address).await.unwrap();
        let login = service
            .verify_challenge(&address, &sign(&key, &challenge.nonce), None, None, None)
            .await
            .unwrap();

        assert!(matches!(
            service.authenticate(&login.session.token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_logout_keeps_identity() {
        let service = service().await;
        let (key, address) = wallet();

        let challenge = service.request_challenge(&address).await.unwrap();
        let login = service
            .verify_challenge(&address, &sign(&key, &challenge.nonce), None, None, None)
            .await
            .unwrap();

        service.logout(&login.session.jti).await.unwrap();

        assert!(matches!(
            service.authenticate(&login.session.token).await,
            Err(AuthError::SessionNotFound)
        ));
        assert!(service.get_identity(login.identity.id).await.is_ok());
    }
}
