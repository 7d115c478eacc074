//! Sessions
//!
//! A session binds a bearer token to one identity. Tokens are signed JWTs;
//! the session row lets logout revoke them before they expire.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use super::jwt::{generate_session_token, get_identity_id_from_claims, verify_token, JwtError};
use crate::models::{AuthSession, IdentityRecord};

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Token error: {0}")]
    TokenError(#[from] JwtError),

    #[error("Session not found or revoked")]
    SessionNotFound,
}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::DatabaseError(e.to_string())
    }
}

/// A freshly opened session
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// A session resolved from a bearer token
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub identity_id: Uuid,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Session store backed by SQLite
#[derive(Clone)]
pub struct SessionStore {
    db_pool: SqlitePool,
    jwt_secret: String,
    ttl_seconds: i64,
}

impl SessionStore {
    pub fn new(db_pool: SqlitePool, jwt_secret: String, ttl_seconds: i64) -> Self {
        Self {
            db_pool,
            jwt_secret,
            ttl_seconds,
        }
    }

    /// Open a session for `identity` and sign its token
    pub async fn open(
        &self,
        identity: &IdentityRecord,
        user_agent: Option<String>,
    ) -> Result<IssuedSession, SessionError> {
        let jti = Uuid::new_v4().to_string();
        let token = generate_session_token(identity, &jti, &self.jwt_secret, self.ttl_seconds)?;

        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.ttl_seconds);

        sqlx::query(
            r#"
            INSERT INTO auth_sessions (id, identity_id, jti, user_agent, expires_at, revoked, created_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(identity.id)
        .bind(&jti)
        .bind(&user_agent)
        .bind(expires_at)
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        tracing::debug!(identity_id = %identity.id, jti = %jti, "Session opened");

        Ok(IssuedSession {
            token,
            jti,
            expires_at,
        })
    }

    /// Resolve a bearer token to its live session
    ///
    /// Fails if the token is forged or expired, or its session was revoked.
    pub async fn resolve(&self, token: &str) -> Result<ActiveSession, SessionError> {
        let claims = verify_token(token, &self.jwt_secret)?;
        let identity_id = get_identity_id_from_claims(&claims)?;

        let session: AuthSession = sqlx::query_as(
            r#"
            SELECT id, identity_id, jti, user_agent, expires_at, revoked, revoked_at, created_at
            FROM auth_sessions
            WHERE jti = $1 AND revoked = FALSE
            "#,
        )
        .bind(&claims.jti)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(SessionError::SessionNotFound)?;

        if session.identity_id != identity_id || session.expires_at <= Utc::now() {
            return Err(SessionError::SessionNotFound);
        }

        Ok(ActiveSession {
            identity_id,
            jti: session.jti,
            expires_at: session.expires_at,
        })
    }

    /// Revoke a session (logout)
    pub async fn revoke(&self, jti: &str) -> Result<(), SessionError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE, revoked_at = $1
            WHERE jti = $2 AND revoked = FALSE
            "#,
        )
        .bind(Utc::now())
        .bind(jti)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(SessionError::SessionNotFound);
        }

        Ok(())
    }

    /// Revoke all sessions for an identity
    pub async fn revoke_all(&self, identity_id: Uuid) -> Result<u64, SessionError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE, revoked_at = $1
            WHERE identity_id = $2 AND revoked = FALSE
            "#,
        )
        .bind(Utc::now())
        .bind(identity_id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    /// Session lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }
}
