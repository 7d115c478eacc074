//! Rate limiting middleware
//!
//! Per-client token buckets, applied to every route.

use axum::{
    body::Body,
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::error::ApiError;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn full(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_take(&mut self, refill_per_second: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_per_second).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared per-client rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    refill_per_second: f64,
    capacity: f64,
}

impl RateLimiter {
    /// `requests_per_second` sustained, with bursts up to twice that
    pub fn new(requests_per_second: u32) -> Self {
        let rps = requests_per_second.max(1) as f64;
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            refill_per_second: rps,
            capacity: rps * 2.0,
        }
    }

    /// Take one token for `client`; false when the client is over its limit
    pub async fn check(&self, client: &str) -> bool {
        let mut buckets = self.buckets.write().await;

        buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::full(self.capacity))
            .try_take(self.refill_per_second, self.capacity)
    }

    /// Forget clients idle for longer than `max_idle`; returns how many
    pub async fn cleanup(&self, max_idle: Duration) -> usize {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        let now = Instant::now();

        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_idle);
        before - buckets.len()
    }

    /// Number of tracked clients
    pub async fn tracked_clients(&self) -> usize {
        self.buckets.read().await.len()
    }
}

/// Middleware closure for `axum::middleware::from_fn`
pub fn rate_limit_layer(
    rate_limiter: RateLimiter,
) -> impl Fn(Request<Body>, Next) -> Pin<Box<dyn Future<Output = Response> + Send>>
       + Clone
       + Send
       + Sync {
    move |request: Request<Body>, next: Next| {
        let rate_limiter = rate_limiter.clone();
        Box::pin(async move {
            let client = client_ip(request.headers());

            if !rate_limiter.check(&client).await {
                tracing::warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded");
                return ApiError::TooManyRequests.into_response();
            }

            next.run(request).await
        })
    }
}

/// Best-effort client address from proxy headers
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return ip.to_string();
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
