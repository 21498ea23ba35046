//! Request extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated, active user from a JWT Bearer token.

pub mod auth;
