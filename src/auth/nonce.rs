//! Pending challenge nonces
//!
//! One live nonce per wallet. Issuing again replaces the previous value and
//! consuming removes it, so every nonce can be redeemed at most once.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;

/// Nonce store errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NonceError {
    #[error("No pending nonce for this address")]
    NotFound,
}

/// A nonce waiting to be signed
#[derive(Debug, Clone)]
pub struct PendingNonce {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingNonce {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// In-memory nonce store keyed by normalized wallet address
#[derive(Clone)]
pub struct NonceStore {
    pending: Arc<RwLock<HashMap<String, PendingNonce>>>,
    ttl: Duration,
}

impl NonceStore {
    /// Create a store whose nonces live for `ttl_seconds`
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            pending: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Issue a fresh nonce for `identity_key`, replacing any pending one
    pub async fn issue(&self, identity_key: &str) -> PendingNonce {
        let now = Utc::now();
        let nonce = PendingNonce {
            value: generate_secure_nonce(),
            issued_at: now,
            expires_at: now + self.ttl,
        };

        let mut pending = self.pending.write().await;
        if pending
            .insert(identity_key.to_string(), nonce.clone())
            .is_some()
        {
            tracing::debug!(identity_key = %identity_key, "Replaced pending nonce");
        }

        nonce
    }

    /// Remove and return the pending nonce for `identity_key`
    ///
    /// Expired nonces are dropped and reported as `NotFound`.
    pub async fn consume(&self, identity_key: &str) -> Result<String, NonceError> {
        let nonce = {
            let mut pending = self.pending.write().await;
            pending.remove(identity_key)
        }
        .ok_or(NonceError::NotFound)?;

        if nonce.is_expired(Utc::now()) {
            tracing::debug!(identity_key = %identity_key, "Discarded expired nonce");
            return Err(NonceError::NotFound);
        }

        Ok(nonce.value)
    }

    /// Drop every expired nonce, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut pending = self.pending.write().await;
        let before = pending.len();
        pending.retain(|_, nonce| !nonce.is_expired(now));
        before - pending.len()
    }

    /// Number of pending nonces
    pub async fn len(&self) -> usize {
        self.pending.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.read().await.is_empty()
    }
}

/// Generate a cryptographically secure nonce (256 bits, hex encoded)
fn generate_secure_nonce() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const KEY: &str = "0xabcabc0000000000000000000000000000000001";

    #[tokio::test]
    async fn test_issue_then_consume_once() {
        let store = NonceStore::new(300);

        let issued = store.issue(KEY).await;
        assert_eq!(store.consume(KEY).await, Ok(issued.value));
        assert_eq!(store.consume(KEY).await, Err(NonceError::NotFound));
    }

    #[tokio::test]
    async fn test_consume_without_issue() {
        let store = NonceStore::new(300);
        assert_eq!(store.consume(KEY).await, Err(NonceError::NotFound));
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous() {
        let store = NonceStore::new(300);

        let first = store.issue(KEY).await;
        let second = store.issue(KEY).await;
        assert_ne!(first.value, second.value);

        assert_eq!(store.consume(KEY).await, Ok(second.value));
        assert_eq!(store.consume(KEY).await, Err(NonceError::NotFound));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = NonceStore::new(300);
        let other = "0xabcabc0000000000000000000000000000000002";

        let a = store.issue(KEY).await;
        let b = store.issue(other).await;

        assert_eq!(store.consume(other).await, Ok(b.value));
        assert_eq!(store.consume(KEY).await, Ok(a.value));
    }

    #[tokio::test]
    async fn test_expired_nonce_not_consumable() {
        let store = NonceStore::new(0);

        store.issue(KEY).await;
        assert_eq!(store.consume(KEY).await, Err(NonceError::NotFound));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let expired = NonceStore::new(0);
        expired.issue(KEY).await;
        expired.issue("0xabcabc0000000000000000000000000000000002").await;
        assert_eq!(expired.purge_expired().await, 2);
        assert_eq!(expired.len().await, 0);

        let live = NonceStore::new(300);
        live.issue(KEY).await;
        assert_eq!(live.purge_expired().await, 0);
        assert_eq!(live.len().await, 1);
    }

    #[tokio::test]
    async fn test_nonce_format_and_uniqueness() {
        let store = NonceStore::new(300);
        let mut seen = HashSet::new();

        for i in 0..100 {
            let nonce = store.issue(&format!("key-{}", i)).await;
            assert_eq!(nonce.value.len(), 64);
            assert!(nonce.value.chars().all(|c| c.is_ascii_hexdigit()));
            assert!(seen.insert(nonce.value));
        }
    }

    #[tokio::test]
    async fn test_concurrent_consume_single_winner() {
        let store = NonceStore::new(300);
        store.issue(KEY).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.consume(KEY).await }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
    }
}
