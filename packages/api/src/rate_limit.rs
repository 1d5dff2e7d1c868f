// ABOUTME: Per-client rate limiting for the analysis endpoints
// ABOUTME: Governor keyed limiter applied as an axum middleware

use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use tracing::{debug, warn};

use crate::error::AppError;

const DEFAULT_ANALYSIS_RPM: u32 = 20;

/// Idle client entries are pruned once the limiter tracks this many keys
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests per minute allowed for each client address
    pub analysis_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            analysis_rpm: DEFAULT_ANALYSIS_RPM,
        }
    }
}

/// Rate limiter shared by every route it is layered on
#[derive(Clone)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        let rpm = NonZeroU32::new(config.analysis_rpm)
            .unwrap_or(NonZeroU32::MIN.saturating_add(DEFAULT_ANALYSIS_RPM - 1));
        debug!(rpm = %rpm, enabled = config.enabled, "Created analysis rate limiter");

        Self {
            config,
            limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(rpm))),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Seconds until the client may retry, or `None` if the request is allowed
    fn check(&self, client: &str) -> Option<u64> {
        if self.limiter.len() > PRUNE_THRESHOLD {
            self.limiter.retain_recent();
        }

        match self.limiter.check_key(&client.to_string()) {
            Ok(()) => None,
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                Some(secs.max(1))
            }
        }
    }
}

/// Identify the caller by socket address, falling back to the forwarding header
fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Per-IP rate limiting middleware
pub async fn rate_limit_middleware(
    State(layer): State<RateLimitLayer>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !layer.config.enabled {
        return Ok(next.run(request).await);
    }

    let client = client_key(&request);
    let path = request.uri().path().to_string();

    match layer.check(&client) {
        None => {
            debug!(client = %client, path = %path, "Rate limit check passed");
            let mut response = next.run(request).await;
            response.headers_mut().insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(layer.config.analysis_rpm),
            );
            Ok(response)
        }
        Some(retry_after) => {
            warn!(client = %client, path = %path, retry_after, "Rate limit exceeded");
            Err(AppError::rate_limited(retry_after, layer.config.analysis_rpm))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_per_client() {
        let layer = RateLimitLayer::new(RateLimitConfig {
            enabled: true,
            analysis_rpm: 2,
        });

        assert!(layer.check("10.0.0.1").is_none());
        assert!(layer.check("10.0.0.1").is_none());
        let retry_after = layer.check("10.0.0.1").expect("third request should be limited");
        assert!(retry_after >= 1);

        assert!(layer.check("10.0.0.2").is_none());
    }

    #[test]
    fn test_zero_rpm_uses_default() {
        let layer = RateLimitLayer::new(RateLimitConfig {
            enabled: true,
            analysis_rpm: 0,
        });
        for _ in 0..DEFAULT_ANALYSIS_RPM {
            assert!(layer.check("client").is_none());
        }
        assert!(layer.check("client").is_some());
    }

    #[test]
    fn test_client_key_prefers_forwarded_header_without_socket() {
        let request = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.7");

        let bare = axum::http::Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(client_key(&bare), "unknown");
    }
}
