//! Authentication Module
//! Mission: Gate the admin panel behind credential checks and short-lived JWTs

pub mod api;
pub mod errors;
pub mod gateway;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod revocation;
pub mod user_store;
pub mod validator;

pub use errors::AuthError;
pub use gateway::{LoginOutcome, SessionGateway};
pub use jwt::{TokenIssuer, TokenLifetimes};
pub use middleware::{require_access_token, CurrentUser};
pub use revocation::{MemoryRevocationStore, RevocationStore, SqliteRevocationStore};
pub use user_store::{UserDirectory, UserStore};
pub use validator::CredentialValidator;
