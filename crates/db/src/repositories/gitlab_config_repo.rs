//! Repository for the `gitlab_configs` table.
//!
//! Every query is scoped by `user_id`: a configuration owned by someone else
//! is indistinguishable from one that does not exist.

use mergedesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::gitlab_config::{CreateGitLabConfig, GitLabConfig, UpdateGitLabConfig};

const COLUMNS: &str = "id, user_id, config_name, gitlab_url, access_token_encrypted, \
                       project_id, is_active, created_at, updated_at";

/// Provides CRUD operations for stored GitLab credentials.
pub struct GitLabConfigRepo;

impl GitLabConfigRepo {
    /// Insert a new configuration for `user_id`, returning the created row.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        input: &CreateGitLabConfig,
    ) -> Result<GitLabConfig, sqlx::Error> {
        let query = format!(
            "INSERT INTO gitlab_configs
                (user_id, config_name, gitlab_url, access_token_encrypted, project_id, is_active)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GitLabConfig>(&query)
            .bind(user_id)
            .bind(&input.config_name)
            .bind(&input.gitlab_url)
            .bind(&input.access_token_encrypted)
            .bind(&input.project_id)
            .bind(input.is_active)
            .fetch_one(pool)
            .await
    }

    /// Find one of the user's configurations by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
    ) -> Result<Option<GitLabConfig>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM gitlab_configs WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, GitLabConfig>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List the user's configurations, oldest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<GitLabConfig>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM gitlab_configs WHERE user_id = $1 ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, GitLabConfig>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Whether the user already holds a configuration for `gitlab_url`,
    /// ignoring `exclude_id` (the row being updated) when given.
    pub async fn exists_for_url(
        pool: &PgPool,
        user_id: DbId,
        gitlab_url: &str,
        exclude_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(
                SELECT 1 FROM gitlab_configs
                WHERE user_id = $1 AND gitlab_url = $2 AND ($3::uuid IS NULL OR id <> $3)
             )",
        )
        .bind(user_id)
        .bind(gitlab_url)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Update one of the user's configurations. Only non-`None` fields are applied;
    /// an empty `config_name` or `project_id` clears the column.
    ///
    /// Returns `None` if no such row belongs to the user.
    pub async fn update(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
        input: &UpdateGitLabConfig,
    ) -> Result<Option<GitLabConfig>, sqlx::Error> {
        let query = format!(
            "UPDATE gitlab_configs SET
                config_name = NULLIF(COALESCE($3, config_name), ''),
                gitlab_url = COALESCE($4, gitlab_url),
                access_token_encrypted = COALESCE($5, access_token_encrypted),
                project_id = NULLIF(COALESCE($6, project_id), ''),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GitLabConfig>(&query)
            .bind(id)
            .bind(user_id)
            .bind(&input.config_name)
            .bind(&input.gitlab_url)
            .bind(&input.access_token_encrypted)
            .bind(&input.project_id)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Persist the outcome of a validation run.
    pub async fn set_active(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
        is_active: bool,
    ) -> Result<Option<GitLabConfig>, sqlx::Error> {
        let query = format!(
            "UPDATE gitlab_configs SET is_active = $3, updated_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GitLabConfig>(&query)
            .bind(id)
            .bind(user_id)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }

    /// Hard-delete one of the user's configurations. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, user_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM gitlab_configs WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
