/*!
 * Rate Limiting Middleware
 *
 * Per-IP rate limiting with three tiers:
 * - global: every endpoint (default 120/min)
 * - auth: auth endpoints (default 10/min)
 * - ai: AI generation and chat endpoints (default 5/min)
 *
 * Uses the governor crate with keyed in-memory state; each source address
 * has its own quota. Responses carry X-RateLimit-Limit / -Remaining /
 * -Reset headers, and 429 responses add Retry-After.
 */

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter as GovernorRateLimiter,
};

use crate::config::RateLimitConfig;
use crate::utils::AppError;

/// Keyed rate limiter: one quota per source IP
type IpRateLimiter = Arc<GovernorRateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>>;

/// The three limiter tiers, cloned into the router as state
#[derive(Clone)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
    global: IpRateLimiter,
    auth: IpRateLimiter,
    ai: IpRateLimiter,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        let keyed = |per_minute: u32| -> IpRateLimiter {
            Arc::new(GovernorRateLimiter::keyed(Quota::per_minute(
                NonZeroU32::new(per_minute.max(1)).unwrap(),
            )))
        };

        Self {
            global: keyed(config.global_per_minute),
            auth: keyed(config.auth_per_minute),
            ai: keyed(config.ai_per_minute),
            config,
        }
    }

    /// Select the tier for a request path
    fn tier_for_path(&self, path: &str) -> (&IpRateLimiter, u32) {
        if path.starts_with("/auth/") {
            (&self.auth, self.config.auth_per_minute)
        } else if path.starts_with("/ai/generate-summary") || path.starts_with("/ai/chat") {
            (&self.ai, self.config.ai_per_minute)
        } else {
            (&self.global, self.config.global_per_minute)
        }
    }
}

/// Rate limiting middleware function
///
/// Keys on the peer address from ConnectInfo. Requests with no resolvable
/// source address (only possible in tests driving the router directly) fall
/// back to a fixed key so the limiter still applies.
pub async fn rate_limit_middleware(
    State(layer): State<RateLimitLayer>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]));

    let (limiter, limit) = layer.tier_for_path(request.uri().path());

    match limiter.check_key(&ip) {
        Ok(_) => {
            let response = next.run(request).await;
            let mut response = response.into_response();
            add_rate_limit_headers(response.headers_mut(), limit, true);
            Ok(response)
        }
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            Err(AppError::RateLimited {
                retry_after_secs: wait.as_secs().max(1),
            })
        }
    }
}

/// Add rate limit headers to the response
fn add_rate_limit_headers(headers: &mut HeaderMap, limit: u32, has_quota: bool) {
    if let Ok(value) = limit.to_string().parse() {
        headers.insert("X-RateLimit-Limit", value);
    }

    let remaining = if has_quota { limit.saturating_sub(1) } else { 0 };
    if let Ok(value) = remaining.to_string().parse() {
        headers.insert("X-RateLimit-Remaining", value);
    }

    // Per-minute quotas refill within the next window
    use std::time::{SystemTime, UNIX_EPOCH};
    let reset_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() + 60)
        .unwrap_or(60);
    if let Ok(value) = reset_time.to_string().parse() {
        headers.insert("X-RateLimit-Reset", value);
    }
}
