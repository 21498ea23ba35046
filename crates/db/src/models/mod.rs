//! Row models and DTOs, one module per table group.

pub mod chat;
pub mod gitlab_config;
pub mod user;
