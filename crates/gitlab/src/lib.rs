//! GitLab integration for MergeDesk.
//!
//! - [`api`]: typed REST client (`/user`, merge request list/detail/changes).
//! - [`validation`]: credential validation with typed error codes.
//! - [`format`]: markdown rendering of merge request data.
//! - [`tools`]: chat-facing operations that always return display text.

pub mod api;
pub mod format;
pub mod models;
pub mod tools;
pub mod validation;

pub use api::{GitLabApi, GitLabApiError};
pub use tools::GitLabTarget;
pub use validation::{ValidationErrorCode, ValidationResult};
