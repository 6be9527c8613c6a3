//! Fixed-window rate limiting per client address
//!
//! Each client gets a counter that lives for one window in a moka cache.
//! The window starts with the client's first request and is not extended
//! by later ones.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use moka::future::Cache;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Upper bound on tracked clients
const MAX_CLIENTS: u64 = 100_000;

/// Request counter keyed by client address
#[derive(Clone)]
pub struct RateLimiter {
    windows: Cache<String, Arc<AtomicU32>>,
    limit: u32,
    window: Duration,
    message: &'static str,
}

impl RateLimiter {
    /// Allow `limit` requests per `window`; `message` is returned once the
    /// limit is exceeded
    pub fn new(limit: u32, window: Duration, message: &'static str) -> Self {
        RateLimiter {
            windows: Cache::builder()
                .max_capacity(MAX_CLIENTS)
                .time_to_live(window)
                .build(),
            limit,
            window,
            message,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request; `false` once the client is over the limit
    pub async fn check(&self, client: &str) -> bool {
        let counter = self
            .windows
            .get_with(client.to_string(), async { Arc::new(AtomicU32::new(0)) })
            .await;
        counter.fetch_add(1, Ordering::Relaxed) < self.limit
    }

    fn rejection(&self) -> Response {
        let seconds = self.window.as_secs();
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "error": self.message,
                "retryAfter": format!("{} seconds", seconds),
            })),
        )
            .into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        response
    }
}

/// Client address: socket peer, then the first `X-Forwarded-For` entry
pub fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware for `axum::middleware::from_fn_with_state`
pub async fn enforce(State(limiter): State<RateLimiter>, request: Request, next: Next) -> Response {
    let client = client_key(&request);
    if !limiter.check(&client).await {
        warn!(
            client = %client,
            path = %request.uri().path(),
            limit = limiter.limit,
            "Rate limit exceeded"
        );
        return limiter.rejection();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn test_limit_is_per_client() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60), "slow down");

        assert!(limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.1").await);
        assert!(!limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.2").await);
    }

    #[test]
    fn test_client_key_sources() {
        let forwarded = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&forwarded), "203.0.113.7");

        let mut direct = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        direct
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 4], 5000))));
        assert_eq!(client_key(&direct), "192.168.1.4");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare), "unknown");
    }
}
