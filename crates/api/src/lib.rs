//! MergeDesk API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes, chat
//! dispatch) so integration tests and the binary entrypoint can both use them.

pub mod auth;
pub mod chat;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
