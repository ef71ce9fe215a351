//! Authentication Errors
//! Mission: One typed taxonomy for every way a login or token operation can fail

use thiserror::Error;

/// Errors produced by the credential validator, token issuer and session gateway.
///
/// Every variant except `Internal` is an expected, user-facing outcome. `Internal`
/// wraps store failures; its detail is logged and never sent to clients.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("account lacks an administrative role")]
    AccessDenied,

    #[error("token could not be parsed or verified")]
    MalformedToken,

    #[error("token has expired")]
    TokenExpired,

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("refresh token is missing")]
    MissingToken,

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Message safe to return to API clients.
    pub fn client_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Invalid credentials.",
            AuthError::AccountDisabled => "Account is disabled.",
            AuthError::AccessDenied => "Access denied. Only administrators can sign in.",
            AuthError::MalformedToken => "Invalid token.",
            AuthError::TokenExpired => "Token has expired.",
            AuthError::TokenRevoked => "Token has been revoked.",
            AuthError::MissingToken => "Refresh token is required.",
            AuthError::Internal(_) => "Internal server error",
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::Internal(_))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::MalformedToken,
        }
    }
}
