//! HTTP server wiring: stores, gateway, router and background maintenance.

use crate::auth::{
    api as auth_api, require_access_token, CredentialValidator, MemoryRevocationStore,
    RevocationStore, SessionGateway, SqliteRevocationStore, TokenIssuer, UserStore,
};
use crate::config::{GatewayConfig, RevocationBackend};
use crate::middleware::{rate_limit_middleware, request_logging, RateLimiter};
use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::interval};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Open the user directory and revocation list, then assemble the session gateway
pub fn build_gateway(config: &GatewayConfig) -> Result<(Arc<SessionGateway>, Arc<UserStore>)> {
    let user_store = Arc::new(UserStore::with_hash_cost(
        &config.auth_db_path,
        config.password_hash_cost,
    )?);

    if let Some(admin) = &config.bootstrap_admin {
        user_store.ensure_bootstrap_admin(&admin.username, &admin.password, &admin.email)?;
    }

    let revocations: Arc<dyn RevocationStore> = match config.revocation_backend {
        RevocationBackend::Sqlite => Arc::new(SqliteRevocationStore::open(&config.auth_db_path)?),
        RevocationBackend::Memory => {
            warn!("Revocation list is in-memory; logouts are forgotten on restart");
            Arc::new(MemoryRevocationStore::new())
        }
    };

    let validator = CredentialValidator::new(user_store.clone(), config.password_hash_cost)?;
    let issuer = TokenIssuer::new(&config.jwt_secret, config.token_lifetimes, revocations)
        .context("Failed to initialize token issuer")?;

    let gateway = Arc::new(SessionGateway::new(user_store.clone(), validator, issuer));
    Ok((gateway, user_store))
}

/// Build the application router.
///
/// Login is public and rate limited; logout, profile and refresh sit behind the
/// bearer-token middleware.
pub fn build_router(gateway: Arc<SessionGateway>, limiter: RateLimiter, api_prefix: &str) -> Router {
    let public_routes = Router::new().route(
        "/login",
        post(auth_api::login).route_layer(middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        )),
    );

    let protected_routes = Router::new()
        .route("/logout", post(auth_api::logout))
        .route("/profile", get(auth_api::profile))
        .route("/refresh", post(auth_api::refresh))
        .route_layer(middleware::from_fn_with_state(
            gateway.clone(),
            require_access_token,
        ));

    let auth_router = public_routes.merge(protected_routes).with_state(gateway);

    let app = if api_prefix.is_empty() {
        Router::new().merge(auth_router)
    } else {
        Router::new().nest(api_prefix, auth_router)
    };

    app.route("/health", get(health_check))
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
}

async fn health_check() -> &'static str {
    "ok"
}

/// Periodically drop expired revocations and stale rate-limit windows
pub async fn maintenance_loop(gateway: Arc<SessionGateway>, limiter: RateLimiter, every: Duration) {
    let mut ticker = interval(every);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        match gateway.prune_revocations() {
            Ok(0) => debug!("No expired revocations to prune"),
            Ok(n) => info!("🧹 Pruned {} expired refresh token revocations", n),
            Err(e) => warn!("Revocation pruning failed: {:#}", e),
        }

        let dropped = limiter.cleanup();
        if dropped > 0 {
            debug!(dropped, "Cleared stale login rate-limit windows");
        }
    }
}

pub async fn serve(config: GatewayConfig) -> Result<()> {
    let (gateway, _user_store) = build_gateway(&config)?;
    info!("🔐 Authentication initialized at: {}", config.auth_db_path);

    let limiter = RateLimiter::new(config.login_rate_limit);
    tokio::spawn(maintenance_loop(
        gateway.clone(),
        limiter.clone(),
        config.revocation_prune_interval,
    ));

    let app = build_router(gateway, limiter, &config.api_prefix);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(
        "🎯 Admin auth gateway listening on {} (prefix: {:?})",
        config.bind_addr, config.api_prefix
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
