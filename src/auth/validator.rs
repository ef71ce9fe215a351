//! Credential Validator
//! Mission: Decide who may obtain tokens through the admin gateway

use crate::auth::{errors::AuthError, models::User, user_store::UserDirectory};
use anyhow::Context;
use bcrypt::{hash, verify};
use std::sync::Arc;
use tracing::warn;

pub struct CredentialValidator {
    directory: Arc<dyn UserDirectory>,
    // Verified against when the username is unknown, so both paths pay for one bcrypt check
    dummy_hash: String,
}

impl CredentialValidator {
    pub fn new(directory: Arc<dyn UserDirectory>, hash_cost: u32) -> anyhow::Result<Self> {
        let dummy_hash =
            hash("admin-gateway-dummy", hash_cost).context("Failed to prepare dummy hash")?;
        Ok(Self {
            directory,
            dummy_hash,
        })
    }

    /// Check a username/password pair and the admin role gate.
    ///
    /// Unknown user and wrong password both yield `InvalidCredentials`; the log
    /// line records which one it was.
    pub fn validate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let Some(user) = self.directory.find_by_username(username)? else {
            let _ = verify(password, &self.dummy_hash);
            warn!(username, reason = "unknown_user", "❌ Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        };

        let password_ok = verify(password, &user.password_hash)
            .with_context(|| format!("Stored password hash for user {} is unreadable", user.id))?;
        if !password_ok {
            warn!(username, reason = "bad_password", "❌ Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            warn!(username, reason = "inactive", "❌ Login refused for disabled account");
            return Err(AuthError::AccountDisabled);
        }

        if !user.has_admin_role() {
            warn!(username, reason = "no_admin_role", "❌ Login refused for non-admin account");
            return Err(AuthError::AccessDenied);
        }

        Ok(user)
    }
}
