//! Credential store: per-user GitLab configurations with validation state.
//!
//! Every operation is scoped to the owning user. A configuration that
//! belongs to someone else is reported as not found.
//!
//! Validation always runs before the insert/update statement, so no database
//! work is held open across the outbound GitLab call.

use mergedesk_core::error::CoreError;
use mergedesk_core::token_cipher::TokenCipher;
use mergedesk_core::types::DbId;
use mergedesk_db::models::gitlab_config::{
    CreateGitLabConfig, GitLabConfig, GitLabConfigResponse, UpdateGitLabConfig,
};
use mergedesk_db::repositories::GitLabConfigRepo;
use mergedesk_gitlab::api::normalize_base_url;
use mergedesk_gitlab::{GitLabApi, ValidationErrorCode, ValidationResult};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

const ENTITY: &str = "GitLab configuration";

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Request body for creating a configuration.
#[derive(Debug, Deserialize)]
pub struct CreateCredential {
    pub config_name: Option<String>,
    pub gitlab_url: String,
    pub access_token: String,
    pub project_id: Option<String>,
}

/// Request body for updating a configuration. Absent fields stay unchanged;
/// an empty `access_token` also means "keep the stored token", while an empty
/// `config_name` or `project_id` clears the stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCredential {
    pub config_name: Option<String>,
    pub gitlab_url: Option<String>,
    pub access_token: Option<String>,
    pub project_id: Option<String>,
    pub is_active: Option<bool>,
}

/// A configuration plus the outcome of the validation that just ran, if any.
///
/// The `validation_*` and `gitlab_username` fields are never stored.
#[derive(Debug, Serialize)]
pub struct CredentialView {
    #[serde(flatten)]
    pub config: GitLabConfigResponse,
    pub validation_message: Option<String>,
    pub validation_error_code: Option<ValidationErrorCode>,
    pub gitlab_username: Option<String>,
}

impl CredentialView {
    fn without_validation(config: GitLabConfig) -> Self {
        Self {
            config: config.into(),
            validation_message: None,
            validation_error_code: None,
            gitlab_username: None,
        }
    }

    fn with_validation(config: GitLabConfig, result: ValidationResult) -> Self {
        Self {
            config: config.into(),
            validation_message: result.message,
            validation_error_code: result.error_code,
            gitlab_username: result.username,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Borrowed view over the collaborators the store needs.
pub struct CredentialStore<'a> {
    pool: &'a PgPool,
    cipher: &'a TokenCipher,
    gitlab: &'a GitLabApi,
}

impl<'a> CredentialStore<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            pool: &state.pool,
            cipher: &state.cipher,
            gitlab: &state.gitlab,
        }
    }

    /// Validate, encrypt and persist a new configuration.
    ///
    /// The record is stored whatever the validation outcome; `is_active`
    /// records whether it succeeded.
    pub async fn create(&self, user_id: DbId, input: CreateCredential) -> AppResult<CredentialView> {
        let gitlab_url = normalize_base_url(&input.gitlab_url);
        if gitlab_url.is_empty() {
            return Err(CoreError::Validation("gitlab_url must not be empty".into()).into());
        }
        let token = input.access_token.trim();
        if token.is_empty() {
            return Err(CoreError::Validation("access_token must not be empty".into()).into());
        }

        if GitLabConfigRepo::exists_for_url(self.pool, user_id, &gitlab_url, None).await? {
            return Err(CoreError::Conflict(
                "GitLab configuration for this URL already exists".into(),
            )
            .into());
        }

        let result = self.gitlab.validate_credential(&gitlab_url, token).await;
        let encrypted = self.cipher.encrypt(token).map_err(CoreError::from)?;

        let config = GitLabConfigRepo::create(
            self.pool,
            user_id,
            &CreateGitLabConfig {
                config_name: non_blank(input.config_name),
                gitlab_url,
                access_token_encrypted: encrypted,
                project_id: non_blank(input.project_id),
                is_active: result.is_valid,
            },
        )
        .await?;

        tracing::info!(
            user_id = %user_id,
            config_id = %config.id,
            is_active = config.is_active,
            "GitLab configuration created",
        );
        Ok(CredentialView::with_validation(config, result))
    }

    /// All of the user's configurations, oldest first.
    pub async fn list(&self, user_id: DbId) -> AppResult<Vec<GitLabConfig>> {
        Ok(GitLabConfigRepo::list_for_user(self.pool, user_id).await?)
    }

    /// One of the user's configurations.
    pub async fn get(&self, user_id: DbId, id: DbId) -> AppResult<GitLabConfig> {
        GitLabConfigRepo::find_by_id(self.pool, user_id, id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Apply an update. Absent fields stay unchanged; a blank `config_name`
    /// or `project_id` clears it.
    ///
    /// A non-empty token or a changed URL triggers re-validation (a URL-only
    /// change re-checks the stored token), and the outcome then decides
    /// `is_active` regardless of any manual value in the same request.
    pub async fn update(
        &self,
        user_id: DbId,
        id: DbId,
        input: UpdateCredential,
    ) -> AppResult<CredentialView> {
        let existing = self.get(user_id, id).await?;

        let new_url = input
            .gitlab_url
            .as_deref()
            .map(normalize_base_url)
            .filter(|u| *u != existing.gitlab_url);
        if let Some(url) = new_url.as_deref() {
            if url.is_empty() {
                return Err(CoreError::Validation("gitlab_url must not be empty".into()).into());
            }
            if GitLabConfigRepo::exists_for_url(self.pool, user_id, url, Some(id)).await? {
                return Err(CoreError::Conflict(
                    "GitLab configuration for this URL already exists".into(),
                )
                .into());
            }
        }

        let new_token = input
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let mut changes = UpdateGitLabConfig {
            config_name: input.config_name.map(|v| v.trim().to_string()),
            gitlab_url: new_url.clone(),
            project_id: input.project_id.map(|v| v.trim().to_string()),
            ..UpdateGitLabConfig::default()
        };

        let target_url = new_url.as_deref().unwrap_or(&existing.gitlab_url);
        let validation = match (new_token, new_url.is_some()) {
            (Some(token), _) => {
                let result = self.gitlab.validate_credential(target_url, token).await;
                changes.access_token_encrypted =
                    Some(self.cipher.encrypt(token).map_err(CoreError::from)?);
                Some(result)
            }
            (None, true) => {
                let token = self.decrypt_token(&existing)?;
                Some(self.gitlab.validate_credential(target_url, &token).await)
            }
            (None, false) => None,
        };
        changes.is_active = match &validation {
            Some(result) => Some(result.is_valid),
            None => input.is_active,
        };

        let config = GitLabConfigRepo::update(self.pool, user_id, id, &changes)
            .await?
            .ok_or_else(|| not_found(id))?;

        tracing::info!(
            user_id = %user_id,
            config_id = %id,
            revalidated = validation.is_some(),
            is_active = config.is_active,
            "GitLab configuration updated",
        );

        Ok(match validation {
            Some(result) => CredentialView::with_validation(config, result),
            None => CredentialView::without_validation(config),
        })
    }

    /// Hard-delete one of the user's configurations.
    pub async fn delete(&self, user_id: DbId, id: DbId) -> AppResult<()> {
        if !GitLabConfigRepo::delete(self.pool, user_id, id).await? {
            return Err(not_found(id));
        }
        tracing::info!(user_id = %user_id, config_id = %id, "GitLab configuration deleted");
        Ok(())
    }

    /// Re-run validation with the stored token and persist the outcome.
    pub async fn revalidate(&self, user_id: DbId, id: DbId) -> AppResult<CredentialView> {
        let existing = self.get(user_id, id).await?;
        let token = self.decrypt_token(&existing)?;

        let result = self
            .gitlab
            .validate_credential(&existing.gitlab_url, &token)
            .await;

        let config = GitLabConfigRepo::set_active(self.pool, user_id, id, result.is_valid)
            .await?
            .ok_or_else(|| not_found(id))?;

        Ok(CredentialView::with_validation(config, result))
    }

    /// Decrypt the stored access token of a configuration.
    pub fn decrypt_token(&self, config: &GitLabConfig) -> Result<String, CoreError> {
        self.cipher
            .decrypt(&config.access_token_encrypted)
            .map_err(|err| {
                tracing::error!(config_id = %config.id, error = %err, "Failed to decrypt stored token");
                CoreError::from(err)
            })
    }
}

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: ENTITY, id })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
