//! JWT Token Issuer
//! Mission: Mint, verify, refresh and revoke admin access/refresh tokens

use crate::auth::{
    errors::AuthError,
    models::{Claims, IssuedToken, TokenPair, TokenType, User},
    revocation::{RevocationEntry, RevocationStore},
};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Validity windows for the two token types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenLifetimes {
    pub fn new(access: Duration, refresh: Duration) -> Result<Self> {
        if access <= Duration::zero() {
            anyhow::bail!("Access token lifetime must be positive");
        }
        if access >= refresh {
            anyhow::bail!(
                "Access token lifetime ({}s) must be shorter than refresh token lifetime ({}s)",
                access.num_seconds(),
                refresh.num_seconds()
            );
        }
        Ok(Self { access, refresh })
    }
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::minutes(5),
            refresh: Duration::days(1),
        }
    }
}

/// Signs tokens with a process-wide HS256 secret and consults the revocation list
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetimes: TokenLifetimes,
    revocations: Arc<dyn RevocationStore>,
}

impl TokenIssuer {
    pub fn new(
        secret: &str,
        lifetimes: TokenLifetimes,
        revocations: Arc<dyn RevocationStore>,
    ) -> Result<Self> {
        if secret.is_empty() {
            anyhow::bail!("JWT signing secret must not be empty");
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetimes: TokenLifetimes::new(lifetimes.access, lifetimes.refresh)?,
            revocations,
        })
    }

    /// Mint an access/refresh pair for a user. Both share one issue time.
    pub fn issue(&self, user: &User) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let subject = user.id.to_string();

        let access = self.mint(TokenType::Access, &subject, now)?;
        let refresh = self.mint(TokenType::Refresh, &subject, now)?;

        debug!(
            user_id = user.id,
            access_exp = access.expires_at,
            refresh_exp = refresh.expires_at,
            "Issued token pair for {}",
            user.username
        );

        Ok(TokenPair { access, refresh })
    }

    /// Mint a new access token from a refresh token. The refresh token is not rotated.
    pub fn refresh(&self, refresh_token: &str) -> Result<IssuedToken, AuthError> {
        let claims = self.decode_as(refresh_token, TokenType::Refresh)?;

        if self.is_revoked(&claims.jti)? {
            debug!(jti = %claims.jti, "Rejected revoked refresh token");
            return Err(AuthError::TokenRevoked);
        }

        let access = self.mint(TokenType::Access, &claims.sub, Utc::now())?;
        debug!(sub = %claims.sub, "Refreshed access token");
        Ok(access)
    }

    /// Add a refresh token to the revocation list. Revoking twice is not an error.
    pub fn revoke(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.decode_as(refresh_token, TokenType::Refresh)?;
        let expires_at = timestamp_to_datetime(claims.exp)?;

        self.revocations.insert(RevocationEntry {
            unique_id: claims.jti.clone(),
            revoked_at: Utc::now(),
            expires_at,
        })?;

        debug!(jti = %claims.jti, sub = %claims.sub, "Revoked refresh token");
        Ok(())
    }

    pub fn is_revoked(&self, unique_id: &str) -> Result<bool, AuthError> {
        Ok(self.revocations.is_revoked(unique_id)?)
    }

    pub fn prune_revocations(&self) -> Result<usize> {
        self.revocations.prune_expired(Utc::now())
    }

    /// Verify an access token's signature, expiry and type
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.decode_as(token, TokenType::Access)
    }

    fn decode_as(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)?.claims;

        if claims.token_type != expected {
            debug!(
                expected = ?expected,
                actual = ?claims.token_type,
                "Token type mismatch"
            );
            return Err(AuthError::MalformedToken);
        }
        Ok(claims)
    }

    fn mint(
        &self,
        token_type: TokenType,
        subject: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let lifetime = match token_type {
            TokenType::Access => self.lifetimes.access,
            TokenType::Refresh => self.lifetimes.refresh,
        };
        let expires_at = issued_at
            .checked_add_signed(lifetime)
            .context("Invalid timestamp")?
            .timestamp();

        let claims = Claims {
            token_type,
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at,
            jti: Uuid::new_v4().simple().to_string(),
        };

        Ok(IssuedToken {
            token: self.encode_claims(&claims)?,
            jti: claims.jti,
            expires_at,
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .context("Failed to generate JWT")
    }
}

fn timestamp_to_datetime(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .with_context(|| format!("Token expiry out of range: {secs}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::MemoryRevocationStore;

    const SECRET: &str = "test-secret-key-12345";

    fn create_test_user() -> User {
        User {
            id: 42,
            username: "admin1".to_string(),
            password_hash: "hash".to_string(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_staff: true,
            is_superuser: false,
            is_admin: false,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    fn create_issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(
            secret,
            TokenLifetimes::default(),
            Arc::new(MemoryRevocationStore::new()),
        )
        .unwrap()
    }

    /// Sign arbitrary claims with the issuer's key
    fn forge(issuer: &TokenIssuer, token_type: TokenType, exp_offset_secs: i64) -> String {
        let now = Utc::now().timestamp();
        issuer
            .encode_claims(&Claims {
                token_type,
                sub: "42".to_string(),
                iat: now - 3600,
                exp: now + exp_offset_secs,
                jti: Uuid::new_v4().simple().to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_lifetime_ordering_enforced() {
        assert!(TokenLifetimes::new(Duration::minutes(5), Duration::days(1)).is_ok());
        assert!(TokenLifetimes::new(Duration::days(1), Duration::days(1)).is_err());
        assert!(TokenLifetimes::new(Duration::days(2), Duration::days(1)).is_err());
        assert!(TokenLifetimes::new(Duration::zero(), Duration::days(1)).is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let result = TokenIssuer::new(
            "",
            TokenLifetimes::default(),
            Arc::new(MemoryRevocationStore::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_issue_pair_claims() {
        let issuer = create_issuer(SECRET);
        let pair = issuer.issue(&create_test_user()).unwrap();

        assert!(pair.access.expires_at < pair.refresh.expires_at);
        assert_ne!(pair.access.jti, pair.refresh.jti);

        let access = issuer.verify_access(&pair.access.token).unwrap();
        assert_eq!(access.sub, "42");
        assert_eq!(access.user_id(), Some(42));
        assert_eq!(access.token_type, TokenType::Access);
        assert_eq!(access.exp, pair.access.expires_at);
        assert_eq!(access.exp - access.iat, 5 * 60);

        let refresh = issuer
            .decode_as(&pair.refresh.token, TokenType::Refresh)
            .unwrap();
        assert_eq!(refresh.jti, pair.refresh.jti);
        assert_eq!(refresh.iat, access.iat);
        assert!(access.exp < refresh.exp);
    }

    #[test]
    fn test_refresh_mints_new_access_token() {
        let issuer = create_issuer(SECRET);
        let pair = issuer.issue(&create_test_user()).unwrap();

        let access = issuer.refresh(&pair.refresh.token).unwrap();
        assert_ne!(access.jti, pair.access.jti);
        let claims = issuer.verify_access(&access.token).unwrap();
        assert_eq!(claims.sub, "42");

        // Refresh token is still usable afterwards
        assert!(issuer.refresh(&pair.refresh.token).is_ok());
    }

    #[test]
    fn test_token_types_not_interchangeable() {
        let issuer = create_issuer(SECRET);
        let pair = issuer.issue(&create_test_user()).unwrap();

        assert!(matches!(
            issuer.refresh(&pair.access.token),
            Err(AuthError::MalformedToken)
        ));
        assert!(matches!(
            issuer.verify_access(&pair.refresh.token),
            Err(AuthError::MalformedToken)
        ));
    }

    #[test]
    fn test_expired_refresh_token() {
        let issuer = create_issuer(SECRET);
        let expired = forge(&issuer, TokenType::Refresh, -10);

        assert!(matches!(
            issuer.refresh(&expired),
            Err(AuthError::TokenExpired)
        ));
        assert!(matches!(
            issuer.revoke(&expired),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let issuer = create_issuer(SECRET);
        let pair = issuer.issue(&create_test_user()).unwrap();

        // Swap in another subject's payload while keeping the original signature
        let other = issuer
            .issue(&User {
                id: 7,
                ..create_test_user()
            })
            .unwrap();
        let original: Vec<&str> = pair.refresh.token.split('.').collect();
        let foreign: Vec<&str> = other.refresh.token.split('.').collect();
        let tampered = format!("{}.{}.{}", original[0], foreign[1], original[2]);

        assert!(matches!(
            issuer.refresh(&tampered),
            Err(AuthError::MalformedToken)
        ));
        assert!(matches!(
            issuer.refresh("invalid.token.here"),
            Err(AuthError::MalformedToken)
        ));
    }

    #[test]
    fn test_different_secrets_reject() {
        let issuer1 = create_issuer("secret1");
        let issuer2 = create_issuer("secret2");
        let pair = issuer1.issue(&create_test_user()).unwrap();

        assert!(matches!(
            issuer2.verify_access(&pair.access.token),
            Err(AuthError::MalformedToken)
        ));
    }

    #[test]
    fn test_revoke_then_refresh() {
        let issuer = create_issuer(SECRET);
        let pair = issuer.issue(&create_test_user()).unwrap();

        assert!(!issuer.is_revoked(&pair.refresh.jti).unwrap());
        issuer.revoke(&pair.refresh.token).unwrap();
        assert!(issuer.is_revoked(&pair.refresh.jti).unwrap());

        // Idempotent
        issuer.revoke(&pair.refresh.token).unwrap();

        assert!(matches!(
            issuer.refresh(&pair.refresh.token),
            Err(AuthError::TokenRevoked)
        ));
    }

    #[test]
    fn test_revoke_rejects_malformed() {
        let issuer = create_issuer(SECRET);
        assert!(matches!(
            issuer.revoke("not-a-jwt"),
            Err(AuthError::MalformedToken)
        ));
    }

    #[test]
    fn test_revocation_entry_kept_until_token_expiry() {
        let store = Arc::new(MemoryRevocationStore::new());
        let issuer =
            TokenIssuer::new(SECRET, TokenLifetimes::default(), store.clone()).unwrap();
        let pair = issuer.issue(&create_test_user()).unwrap();

        issuer.revoke(&pair.refresh.token).unwrap();
        assert_eq!(issuer.prune_revocations().unwrap(), 0);
        assert_eq!(store.len(), 1);

        let after_expiry = Utc.timestamp_opt(pair.refresh.expires_at + 1, 0).unwrap();
        assert_eq!(store.prune_expired(after_expiry).unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_prune_in_expiry_second_keeps_revocation() {
        let store = Arc::new(MemoryRevocationStore::new());
        let issuer =
            TokenIssuer::new(SECRET, TokenLifetimes::default(), store.clone()).unwrap();
        let pair = issuer.issue(&create_test_user()).unwrap();
        issuer.revoke(&pair.refresh.token).unwrap();

        // The token still verifies while exp == now
        let at_expiry = Utc.timestamp_opt(pair.refresh.expires_at, 0).unwrap();
        assert_eq!(store.prune_expired(at_expiry).unwrap(), 0);

        assert!(matches!(
            issuer.refresh(&pair.refresh.token),
            Err(AuthError::TokenRevoked)
        ));
    }
}
