//! Gateway configuration.
//!
//! Everything is read from environment variables (a `.env` file is loaded first
//! by the binary). Parsing goes through a lookup function so tests can supply
//! values without touching the process environment.

use crate::auth::TokenLifetimes;
use crate::middleware::RateLimitConfig;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationBackend {
    Sqlite,
    Memory,
}

impl FromStr for RevocationBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(RevocationBackend::Sqlite),
            "memory" => Ok(RevocationBackend::Memory),
            other => anyhow::bail!("Unknown revocation backend: {other} (expected sqlite|memory)"),
        }
    }
}

/// Superuser created on startup when the directory has no admin yet
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub api_prefix: String,
    pub auth_db_path: String,
    pub jwt_secret: String,
    pub token_lifetimes: TokenLifetimes,
    pub password_hash_cost: u32,
    pub revocation_backend: RevocationBackend,
    pub revocation_prune_interval: Duration,
    pub login_rate_limit: RateLimitConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => {
                if secret.len() < 32 {
                    warn!("⚠️  JWT_SECRET is shorter than 32 bytes");
                }
                secret
            }
            None => {
                warn!("⚠️  JWT_SECRET not set, using development secret. CHANGE IN PRODUCTION!");
                DEV_JWT_SECRET.to_string()
            }
        };

        let access_minutes: i64 = parse_or(&get, "ACCESS_TOKEN_LIFETIME_MINUTES", 5)?;
        let refresh_days: i64 = parse_or(&get, "REFRESH_TOKEN_LIFETIME_DAYS", 1)?;
        let access = chrono::Duration::try_minutes(access_minutes).with_context(|| {
            format!("ACCESS_TOKEN_LIFETIME_MINUTES={access_minutes} is out of range")
        })?;
        let refresh = chrono::Duration::try_days(refresh_days)
            .with_context(|| format!("REFRESH_TOKEN_LIFETIME_DAYS={refresh_days} is out of range"))?;
        let token_lifetimes =
            TokenLifetimes::new(access, refresh).context("Invalid token lifetimes")?;

        let password_hash_cost: u32 = parse_or(&get, "PASSWORD_HASH_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&password_hash_cost) {
            anyhow::bail!("PASSWORD_HASH_COST must be between 4 and 31, got {password_hash_cost}");
        }

        let max_attempts: u32 = parse_or(&get, "LOGIN_RATE_LIMIT_MAX_ATTEMPTS", 10)?;
        let window_secs: u64 = parse_or(&get, "LOGIN_RATE_LIMIT_WINDOW_SECS", 60)?;
        let prune_secs: u64 = parse_or(&get, "REVOCATION_PRUNE_INTERVAL_SECS", 3600)?;
        if prune_secs == 0 {
            anyhow::bail!("REVOCATION_PRUNE_INTERVAL_SECS must be greater than zero");
        }

        let bootstrap_admin = match (
            get("BOOTSTRAP_ADMIN_USERNAME"),
            get("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(BootstrapAdmin {
                username,
                password,
                email: get("BOOTSTRAP_ADMIN_EMAIL").unwrap_or_default(),
            }),
            (None, None) => None,
            _ => anyhow::bail!(
                "BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD must be set together"
            ),
        };

        Ok(Self {
            bind_addr: parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8000)))?,
            api_prefix: normalize_prefix(&get("API_PREFIX").unwrap_or_else(|| "/api/auth".into())),
            auth_db_path: get("AUTH_DB_PATH").unwrap_or_else(|| "admin_auth.db".to_string()),
            jwt_secret,
            token_lifetimes,
            password_hash_cost,
            revocation_backend: parse_or(&get, "REVOCATION_BACKEND", RevocationBackend::Sqlite)?,
            revocation_prune_interval: Duration::from_secs(prune_secs),
            login_rate_limit: RateLimitConfig {
                max_attempts,
                window: Duration::from_secs(window_secs),
            },
            bootstrap_admin,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {key}={raw}: {e}")),
        None => Ok(default),
    }
}

/// `api/auth/` -> `/api/auth`; an empty or `/` prefix mounts at the root
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
