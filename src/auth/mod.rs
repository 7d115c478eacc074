//! Authentication module for CrediLink
//!
//! Provides wallet-based authentication using Ethereum addresses.
//! - Challenge-response authentication with single-use nonces
//! - `personal_sign` signer recovery
//! - JWT session tokens with server-side revocation

mod crypto;
mod jwt;
mod nonce;
mod service;
mod session;

pub use crypto::{
    address_from_verifying_key, addresses_match, normalize_address, recover_signer,
    short_address, CryptoError,
};
pub use jwt::{generate_session_token, verify_token, Claims, JwtError};
pub use nonce::{NonceError, NonceStore, PendingNonce};
pub use service::{AuthError, ChallengeService, VerifiedLogin};
pub use session::{ActiveSession, IssuedSession, SessionError, SessionStore};
