//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod chat_repo;
pub mod gitlab_config_repo;
pub mod user_repo;

pub use chat_repo::{ChatMessageRepo, ChatSessionRepo};
pub use gitlab_config_repo::GitLabConfigRepo;
pub use user_repo::UserRepo;
