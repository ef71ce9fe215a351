//! Admin Auth Gateway Library
//!
//! Credential validation, JWT issuance/refresh/revocation and the HTTP surface
//! for the administrative panel. The binary in `main.rs` only wires CLI and
//! configuration around these modules.

pub mod auth;
pub mod config;
pub mod middleware;
pub mod server;
