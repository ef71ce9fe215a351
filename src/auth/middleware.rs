//! Authentication Middleware
//! Mission: Protect admin endpoints with bearer access-token validation

use crate::auth::{errors::AuthError, gateway::SessionGateway, models::User};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// The user resolved from the request's access token
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Validates `Authorization: Bearer <access token>` and attaches the user to the request
pub async fn require_access_token(
    State(gateway): State<Arc<SessionGateway>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let bearer = match req.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(bearer)) => bearer,
        None if req.headers().contains_key(AUTHORIZATION) => {
            return Err(AuthRejection::InvalidFormat)
        }
        None => return Err(AuthRejection::MissingToken),
    };

    let user = gateway.authenticate(bearer.token()).map_err(|e| {
        debug!(error = %e, path = %req.uri().path(), "Bearer token rejected");
        AuthRejection::from(e)
    })?;

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

/// Why a request was refused by the bearer middleware
#[derive(Debug)]
pub enum AuthRejection {
    MissingToken,
    InvalidFormat,
    InvalidToken,
    ExpiredToken,
    UserUnavailable,
    Internal,
}

impl From<AuthError> for AuthRejection {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired => AuthRejection::ExpiredToken,
            AuthError::InvalidCredentials | AuthError::AccountDisabled => {
                AuthRejection::UserUnavailable
            }
            AuthError::Internal(_) => AuthRejection::Internal,
            _ => AuthRejection::InvalidToken,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthRejection::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided.",
            ),
            AuthRejection::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "Invalid authorization format. Use: Bearer {token}",
            ),
            AuthRejection::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "Given token not valid for any token type")
            }
            AuthRejection::ExpiredToken => (StatusCode::UNAUTHORIZED, "Token has expired"),
            AuthRejection::UserUnavailable => {
                (StatusCode::UNAUTHORIZED, "User not found or inactive")
            }
            AuthRejection::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ),
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
