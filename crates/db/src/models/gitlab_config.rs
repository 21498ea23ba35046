//! GitLab configuration (stored credential) model and DTOs.

use mergedesk_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Full row from the `gitlab_configs` table.
///
/// `access_token_encrypted` is opaque cipher output; only the token cipher
/// reads or writes it, and it never leaves the service.
#[derive(Debug, Clone, FromRow)]
pub struct GitLabConfig {
    pub id: DbId,
    pub user_id: DbId,
    pub config_name: Option<String>,
    pub gitlab_url: String,
    pub access_token_encrypted: Vec<u8>,
    pub project_id: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl GitLabConfig {
    /// Name shown in selection lists, falling back to a positional label.
    pub fn display_name(&self, position: usize) -> String {
        match self.config_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Config {position}"),
        }
    }
}

/// External representation of a stored credential (no token material).
#[derive(Debug, Clone, Serialize)]
pub struct GitLabConfigResponse {
    pub id: DbId,
    pub config_name: Option<String>,
    pub gitlab_url: String,
    pub project_id: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<GitLabConfig> for GitLabConfigResponse {
    fn from(config: GitLabConfig) -> Self {
        Self {
            id: config.id,
            config_name: config.config_name,
            gitlab_url: config.gitlab_url,
            project_id: config.project_id,
            is_active: config.is_active,
            created_at: config.created_at,
            updated_at: config.updated_at,
        }
    }
}

/// DTO for inserting a credential. The token is already encrypted and
/// `is_active` already reflects the validation outcome.
#[derive(Debug)]
pub struct CreateGitLabConfig {
    pub config_name: Option<String>,
    pub gitlab_url: String,
    pub access_token_encrypted: Vec<u8>,
    pub project_id: Option<String>,
    pub is_active: bool,
}

/// DTO for updating a credential. Only non-`None` fields are applied.
/// `Some("")` for `config_name` or `project_id` clears the value.
#[derive(Debug, Default)]
pub struct UpdateGitLabConfig {
    pub config_name: Option<String>,
    pub gitlab_url: Option<String>,
    pub access_token_encrypted: Option<Vec<u8>>,
    pub project_id: Option<String>,
    pub is_active: Option<bool>,
}
