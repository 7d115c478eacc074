//! Database connection and pool management
//!
//! Identity records and sessions live in SQLite. The schema is small enough
//! to be embedded and applied at startup.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

/// Database connection error
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS identities (
        id BLOB PRIMARY KEY NOT NULL,
        address TEXT NOT NULL,
        role TEXT NOT NULL,
        display_name TEXT NOT NULL,
        verified BOOLEAN NOT NULL DEFAULT FALSE,
        ens_name TEXT,
        email TEXT,
        avatar TEXT,
        bio TEXT,
        skills TEXT NOT NULL DEFAULT '[]',
        company TEXT,
        experience TEXT,
        wallet_type TEXT,
        chain_id INTEGER,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (address, role)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_identities_address ON identities (address)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS auth_sessions (
        id BLOB PRIMARY KEY NOT NULL,
        identity_id BLOB NOT NULL REFERENCES identities (id),
        jti TEXT NOT NULL UNIQUE,
        user_agent TEXT,
        expires_at TEXT NOT NULL,
        revoked BOOLEAN NOT NULL DEFAULT FALSE,
        revoked_at TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_auth_sessions_identity ON auth_sessions (identity_id)
    "#,
];

/// Create a database connection pool from configuration
pub async fn create_pool(config: &Config) -> Result<SqlitePool, DbError> {
    tracing::info!("Connecting to database at {}", config.database_url);
    connect(&config.database_url, config.db_max_connections).await
}

/// Connect to `database_url`
///
/// In-memory databases exist per connection, so they are pinned to a single
/// connection that is never recycled.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, DbError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| DbError::ConnectionError(e.to_string()))?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = database_url.contains(":memory:");

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(Duration::from_secs(600))
    };

    let pool = pool_options
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    tracing::info!("Database connection pool created successfully");

    Ok(pool)
}

/// Apply the embedded schema
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DbError::MigrationError(e.to_string()))?;
    }

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

/// Check database connectivity (for health checks)
pub async fn check_health(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::HealthCheckError(e.to_string()))?;

    Ok(())
}

/// Fresh in-memory database with the schema applied
pub async fn memory_pool() -> Result<SqlitePool, DbError> {
    let pool = connect("sqlite::memory:", 1).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
