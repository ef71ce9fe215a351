//! Access log for the gateway.
//!
//! Refused authentication attempts (401 and 429) are logged at WARN with the
//! client address so brute-force patterns stand out from ordinary 4xx noise.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{info, warn};

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    let status = response.status();

    match status {
        s if s.is_server_error() => {
            warn!(%method, %path, %client, status = s.as_u16(), latency_ms, "Request failed (5xx)")
        }
        StatusCode::UNAUTHORIZED | StatusCode::TOO_MANY_REQUESTS => {
            warn!(%method, %path, %client, status = status.as_u16(), latency_ms, "🔒 Auth refused")
        }
        s => info!(%method, %path, status = s.as_u16(), latency_ms, "Request completed"),
    }

    response
}
