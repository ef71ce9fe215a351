//! HTTP middleware shared by all routes.
//!
//! - Request logging with latency tracking
//! - Per-IP rate limiting for the login endpoint

pub mod logging;
pub mod rate_limit;

pub use logging::request_logging;
pub use rate_limit::{rate_limit_middleware, RateLimitConfig, RateLimiter};
