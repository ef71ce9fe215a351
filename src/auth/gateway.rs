//! Session Gateway
//! Mission: Orchestrate login, logout, profile and refresh over stateless token pairs
//!
//! No session object lives on the server. Every call is verified on its own from
//! the tokens it carries; the revocation list is the only shared mutable state.

use crate::auth::{
    errors::AuthError,
    jwt::TokenIssuer,
    models::{Credentials, IssuedToken, TokenPair, User, UserProfile},
    user_store::UserDirectory,
    validator::CredentialValidator,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub user: UserProfile,
}

pub struct SessionGateway {
    directory: Arc<dyn UserDirectory>,
    validator: CredentialValidator,
    issuer: TokenIssuer,
}

impl SessionGateway {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        validator: CredentialValidator,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            directory,
            validator,
            issuer,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, AuthError> {
        info!("🔐 Login attempt: {}", credentials.username);

        let user = self
            .validator
            .validate(&credentials.username, &credentials.password)?;
        let tokens = self.issuer.issue(&user)?;

        info!(user_id = user.id, "✅ Login successful: {}", user.username);

        Ok(LoginOutcome {
            tokens,
            user: UserProfile::from_user(&user),
        })
    }

    /// Revoke the refresh token. Only a missing token is reported; any other
    /// failure is logged and the logout still succeeds.
    pub fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        let token = present(refresh_token).ok_or(AuthError::MissingToken)?;

        match self.issuer.revoke(token) {
            Ok(()) => info!("👋 Logout: refresh token revoked"),
            Err(e) if e.is_internal() => {
                warn!(error = %e, "Logout could not record revocation; ignoring")
            }
            Err(e) => debug!(error = %e, "Logout with unusable refresh token; ignoring"),
        }
        Ok(())
    }

    /// Profile of a user already authenticated by the request-authorization layer
    pub fn profile(&self, user: &User) -> UserProfile {
        UserProfile::from_user(user)
    }

    pub fn refresh(&self, refresh_token: Option<&str>) -> Result<IssuedToken, AuthError> {
        let token = present(refresh_token).ok_or(AuthError::MissingToken)?;
        self.issuer.refresh(token)
    }

    /// Resolve a bearer access token to a live, active user record
    pub fn authenticate(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self.issuer.verify_access(access_token)?;
        let user_id = claims.user_id().ok_or(AuthError::MalformedToken)?;

        let Some(user) = self.directory.find_by_id(user_id)? else {
            warn!(user_id, "Access token subject no longer exists");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active {
            warn!(user_id, "Access token presented for disabled account");
            return Err(AuthError::AccountDisabled);
        }

        Ok(user)
    }

    pub fn prune_revocations(&self) -> Result<usize> {
        self.issuer.prune_revocations()
    }
}

fn present(token: Option<&str>) -> Option<&str> {
    token.map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        jwt::TokenLifetimes, models::NewUser, revocation::MemoryRevocationStore,
        user_store::UserStore,
    };
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use tempfile::NamedTempFile;

    const TEST_HASH_COST: u32 = 4;
    const SECRET: &str = "gateway-test-secret";

    struct Fixture {
        gateway: SessionGateway,
        store: Arc<UserStore>,
        _temp: NamedTempFile,
    }

    fn fixture() -> Fixture {
        let temp = NamedTempFile::new().unwrap();
        let store = Arc::new(
            UserStore::with_hash_cost(temp.path().to_str().unwrap(), TEST_HASH_COST).unwrap(),
        );
        let validator = CredentialValidator::new(store.clone(), TEST_HASH_COST).unwrap();
        let issuer = TokenIssuer::new(
            SECRET,
            TokenLifetimes::default(),
            Arc::new(MemoryRevocationStore::new()),
        )
        .unwrap();

        Fixture {
            gateway: SessionGateway::new(store.clone(), validator, issuer),
            store,
            _temp: temp,
        }
    }

    fn add_user(store: &UserStore, username: &str, active: bool, is_staff: bool) -> User {
        store
            .create_user(&NewUser {
                username: username.to_string(),
                password: "pw".to_string(),
                is_active: active,
                is_staff,
                ..Default::default()
            })
            .unwrap()
    }

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn decoded_exp(token: &str) -> i64 {
        let mut validation = Validation::default();
        validation.validate_exp = false;
        decode::<serde_json::Value>(token, &DecodingKey::from_secret(SECRET.as_bytes()), &validation)
            .unwrap()
            .claims["exp"]
            .as_i64()
            .unwrap()
    }

    #[test]
    fn test_admin_session_lifecycle() {
        let f = fixture();
        add_user(&f.store, "admin1", true, true);

        let outcome = f.gateway.login(&creds("admin1", "pw")).unwrap();
        assert_eq!(outcome.user.username, "admin1");
        assert!(
            decoded_exp(&outcome.tokens.access.token) < decoded_exp(&outcome.tokens.refresh.token)
        );

        let refresh_token = outcome.tokens.refresh.token.as_str();
        let renewed = f.gateway.refresh(Some(refresh_token)).unwrap();
        assert!(f.gateway.authenticate(&renewed.token).is_ok());

        f.gateway.logout(Some(refresh_token)).unwrap();
        assert!(matches!(
            f.gateway.refresh(Some(refresh_token)),
            Err(AuthError::TokenRevoked)
        ));
    }

    #[test]
    fn test_non_admin_login_denied() {
        let f = fixture();
        add_user(&f.store, "bob", true, false);

        assert!(matches!(
            f.gateway.login(&creds("bob", "pw")),
            Err(AuthError::AccessDenied)
        ));
    }

    #[test]
    fn test_logout_is_idempotent() {
        let f = fixture();
        add_user(&f.store, "admin1", true, true);
        let outcome = f.gateway.login(&creds("admin1", "pw")).unwrap();
        let refresh = outcome.tokens.refresh;

        f.gateway.logout(Some(&refresh.token)).unwrap();
        assert!(f.gateway.issuer().is_revoked(&refresh.jti).unwrap());
        f.gateway.logout(Some(&refresh.token)).unwrap();
        assert!(f.gateway.issuer().is_revoked(&refresh.jti).unwrap());
    }

    #[test]
    fn test_logout_swallows_token_errors() {
        let f = fixture();
        assert!(f.gateway.logout(Some("garbage")).is_ok());

        assert!(matches!(f.gateway.logout(None), Err(AuthError::MissingToken)));
        assert!(matches!(
            f.gateway.logout(Some("   ")),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn test_refresh_requires_token() {
        let f = fixture();
        assert!(matches!(f.gateway.refresh(None), Err(AuthError::MissingToken)));
        assert!(matches!(
            f.gateway.refresh(Some("")),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            f.gateway.refresh(Some("abc.def.ghi")),
            Err(AuthError::MalformedToken)
        ));
    }

    #[test]
    fn test_authenticate_rejects_deactivated_user() {
        let f = fixture();
        add_user(&f.store, "admin1", true, true);
        let outcome = f.gateway.login(&creds("admin1", "pw")).unwrap();

        let user = f.gateway.authenticate(&outcome.tokens.access.token).unwrap();
        assert_eq!(f.gateway.profile(&user), outcome.user);

        f.store.set_active("admin1", false).unwrap();
        assert!(matches!(
            f.gateway.authenticate(&outcome.tokens.access.token),
            Err(AuthError::AccountDisabled)
        ));
    }

    #[test]
    fn test_authenticate_rejects_refresh_token() {
        let f = fixture();
        add_user(&f.store, "admin1", true, true);
        let outcome = f.gateway.login(&creds("admin1", "pw")).unwrap();

        assert!(matches!(
            f.gateway.authenticate(&outcome.tokens.refresh.token),
            Err(AuthError::MalformedToken)
        ));
    }
}
