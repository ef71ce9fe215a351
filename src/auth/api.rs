//! Authentication API Endpoints
//! Mission: Expose login, logout, profile and token refresh over HTTP

use crate::auth::{
    errors::AuthError,
    gateway::SessionGateway,
    middleware::CurrentUser,
    models::{
        FieldErrors, LoginRequest, LoginResponse, MessageResponse, RefreshResponse,
        RefreshTokenRequest, UserProfile,
    },
};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

pub const LOGIN_SUCCESS_MESSAGE: &str = "Login successful";
pub const LOGOUT_SUCCESS_MESSAGE: &str = "Logout successful";

/// Login endpoint - POST {prefix}/login
pub async fn login(
    State(gateway): State<Arc<SessionGateway>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    let Json(payload) = payload?;
    let credentials = payload.validate().map_err(AuthApiError::Fields)?;

    let outcome = gateway
        .login(&credentials)
        .map_err(AuthApiError::Login)?;

    Ok(Json(LoginResponse {
        access_token: outcome.tokens.access.token,
        refresh_token: outcome.tokens.refresh.token,
        user: outcome.user,
        message: LOGIN_SUCCESS_MESSAGE.to_string(),
    }))
}

/// Logout endpoint - POST {prefix}/logout (requires bearer auth)
pub async fn logout(
    State(gateway): State<Arc<SessionGateway>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Bytes,
) -> Result<Json<MessageResponse>, AuthApiError> {
    let payload = token_request(&body)?;

    gateway
        .logout(payload.refresh_token.as_deref())
        .map_err(AuthApiError::Token)?;

    debug!(user_id = user.id, "Logout completed for {}", user.username);

    Ok(Json(MessageResponse {
        message: LOGOUT_SUCCESS_MESSAGE.to_string(),
    }))
}

/// Current admin profile - GET {prefix}/profile (requires bearer auth)
pub async fn profile(
    State(gateway): State<Arc<SessionGateway>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<UserProfile> {
    Json(gateway.profile(&user))
}

/// Token refresh - POST {prefix}/refresh (requires bearer auth)
pub async fn refresh(
    State(gateway): State<Arc<SessionGateway>>,
    body: Bytes,
) -> Result<Json<RefreshResponse>, AuthApiError> {
    let payload = token_request(&body)?;

    let access = gateway
        .refresh(payload.refresh_token.as_deref())
        .map_err(AuthApiError::Token)?;

    Ok(Json(RefreshResponse {
        access_token: access.token,
    }))
}

/// An empty body is a request without a token, not a malformed one
fn token_request(body: &[u8]) -> Result<RefreshTokenRequest, AuthApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RefreshTokenRequest::default());
    }
    let Json(payload) = Json::<RefreshTokenRequest>::from_bytes(body)?;
    Ok(payload)
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    /// Request fields failed validation
    Fields(FieldErrors),
    /// Login refused; rendered as `non_field_errors`
    Login(AuthError),
    /// Token operation refused; rendered as a flat `error`
    Token(AuthError),
    MalformedBody(JsonRejection),
}

impl From<JsonRejection> for AuthApiError {
    fn from(rejection: JsonRejection) -> Self {
        AuthApiError::MalformedBody(rejection)
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        match self {
            AuthApiError::Login(e) | AuthApiError::Token(e) if e.is_internal() => {
                error!(error = %e, "Auth request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.client_message() })),
                )
                    .into_response()
            }
            AuthApiError::Fields(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            AuthApiError::Login(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "non_field_errors": [e.client_message()] })),
            )
                .into_response(),
            AuthApiError::Token(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.client_message() })),
            )
                .into_response(),
            AuthApiError::MalformedBody(rejection) => {
                debug!(error = %rejection.body_text(), "Rejected request body");
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "detail": "Malformed request body." })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_api_error_statuses() {
        let fields = AuthApiError::Fields(FieldErrors::new()).into_response();
        assert_eq!(fields.status(), StatusCode::BAD_REQUEST);

        let denied = AuthApiError::Login(AuthError::AccessDenied).into_response();
        assert_eq!(denied.status(), StatusCode::BAD_REQUEST);

        let revoked = AuthApiError::Token(AuthError::TokenRevoked).into_response();
        assert_eq!(revoked.status(), StatusCode::BAD_REQUEST);

        let internal =
            AuthApiError::Login(AuthError::Internal(anyhow::anyhow!("db locked"))).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_token_request_body_parsing() {
        assert!(token_request(b"").unwrap().refresh_token.is_none());
        assert!(token_request(b"  \n").unwrap().refresh_token.is_none());
        assert_eq!(
            token_request(br#"{"refresh_token":"abc"}"#)
                .unwrap()
                .refresh_token
                .as_deref(),
            Some("abc")
        );
        assert!(matches!(
            token_request(b"{not json"),
            Err(AuthApiError::MalformedBody(_))
        ));
    }
}
