//! CrediLink auth server
//!
//! Serves the wallet challenge-response flow (`POST /nonce`, `POST /verify`)
//! plus session and profile endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;

use credilink_server::auth::{ChallengeService, NonceStore, SessionStore};
use credilink_server::config::Config;
use credilink_server::db;
use credilink_server::identity::IdentityRegistry;
use credilink_server::middleware::RateLimiter;
use credilink_server::routes::create_app;
use credilink_server::state::AppState;

/// Rate limiter buckets idle this long are dropped
const RATE_LIMIT_IDLE: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting CrediLink auth server");

    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;
    tracing::info!("Database ready");

    let challenge_service = Arc::new(ChallengeService::new(
        NonceStore::new(config.auth_nonce_ttl_seconds),
        IdentityRegistry::new(db_pool.clone()),
        SessionStore::new(
            db_pool.clone(),
            config.jwt_secret.clone(),
            config.session_ttl_seconds,
        ),
    ));

    let nonces = challenge_service.nonces().clone();
    let purge_every = Duration::from_secs(config.nonce_purge_interval_seconds.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            interval.tick().await;
            let purged = nonces.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "Purged expired nonces");
            }
        }
    });

    let rate_limiter = RateLimiter::new(config.rate_limit_rps);
    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_IDLE);
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup(RATE_LIMIT_IDLE).await;
        }
    });

    let app_state = AppState::new(challenge_service, db_pool);
    let app = create_app(app_state, rate_limiter, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
