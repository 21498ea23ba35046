pub mod auth;
pub mod chat;
pub mod gitlab_config;
pub mod status;
