//! Authentication Models
//! Mission: Define admin user, token and request/response data structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Admin user account as stored in the user directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Admin role gate: only these users may obtain tokens.
    pub fn has_admin_role(&self) -> bool {
        self.is_staff || self.is_superuser || self.is_admin
    }
}

/// Public projection of a user (returned by login and profile)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_admin: bool,
}

impl UserProfile {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            is_admin: user.is_admin,
        }
    }
}

/// Fields for a new directory entry
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims shared by access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    pub sub: String, // subject (user id)
    pub iat: i64,
    pub exp: i64,
    pub jti: String, // unique id, checked against the revocation list for refresh tokens
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// A signed token together with its expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Field-level validation errors, rendered as `{field: [messages]}`
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Login request body. Fields are optional so missing ones become field errors
/// instead of a body rejection.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Username/password pair that passed field validation
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = required_field(&mut errors, "username", self.username);
        let password = required_field(&mut errors, "password", self.password);

        match (username, password) {
            (Some(username), Some(password)) if errors.is_empty() => {
                Ok(Credentials { username, password })
            }
            _ => Err(errors),
        }
    }
}

fn required_field(errors: &mut FieldErrors, name: &str, value: Option<String>) -> Option<String> {
    match value {
        None => {
            errors.insert(name.to_string(), vec!["This field is required.".to_string()]);
            None
        }
        Some(v) if v.trim().is_empty() => {
            errors.insert(
                name.to_string(),
                vec!["This field may not be blank.".to_string()],
            );
            None
        }
        Some(v) => Some(v),
    }
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
    pub message: String,
}

/// Body for logout and refresh
#[derive(Debug, Default, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
