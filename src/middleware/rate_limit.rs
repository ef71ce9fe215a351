//! Login rate limiting.
//!
//! Fixed-window attempt counter per client IP, applied to the login route to
//! slow down password guessing.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Attempts allowed per window.
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Shared attempt counters, cheap to clone into router state
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
}

struct Window {
    attempts: u32,
    started: Instant,
}

#[derive(Debug, PartialEq, Eq)]
enum Decision {
    Allow,
    Reject { retry_after: Duration },
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Decision {
        let mut windows = self.windows.lock();
        let window = windows.entry(ip).or_insert(Window {
            attempts: 0,
            started: now,
        });

        if now.duration_since(window.started) >= self.config.window {
            window.attempts = 0;
            window.started = now;
        }

        if window.attempts >= self.config.max_attempts {
            let reset_at = window.started + self.config.window;
            return Decision::Reject {
                retry_after: reset_at.saturating_duration_since(now),
            };
        }

        window.attempts += 1;
        Decision::Allow
    }

    /// Forget windows that have fully elapsed (called from the maintenance task).
    pub fn cleanup(&self) -> usize {
        let mut windows = self.windows.lock();
        let now = Instant::now();
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.started) < self.config.window);
        before - windows.len()
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }
}

/// Rate limiting middleware function.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = addr.ip();

    match limiter.check_at(ip, Instant::now()) {
        Decision::Allow => next.run(request).await,
        Decision::Reject { retry_after } => {
            // Round up so clients never retry before the window resets
            let retry_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            warn!(ip = %ip, retry_after_secs = retry_secs, "Login rate limit exceeded");

            (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_secs.to_string())],
                Json(json!({
                    "error": "Too many login attempts. Please try again later.",
                    "retry_after_seconds": retry_secs,
                })),
            )
                .into_response()
        }
    }
}
