//! Handlers for `/gitlab/configs` (stored GitLab credentials).
//!
//! All endpoints require authentication via [`AuthUser`] and only ever see
//! the caller's own configurations.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use mergedesk_core::types::DbId;
use mergedesk_db::models::gitlab_config::GitLabConfigResponse;

use crate::credentials::{CreateCredential, CredentialStore, UpdateCredential};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/gitlab/configs
pub async fn list_configs(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let configs: Vec<GitLabConfigResponse> = CredentialStore::new(&state)
        .list(auth.user_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(DataResponse { data: configs }))
}

/// POST /api/v1/gitlab/configs
///
/// Validates the credential against GitLab and stores it either way; the
/// response says whether validation passed.
pub async fn create_config(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateCredential>,
) -> AppResult<impl IntoResponse> {
    let view = CredentialStore::new(&state)
        .create(auth.user_id, input)
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: view })))
}

/// GET /api/v1/gitlab/configs/{id}
pub async fn get_config(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let config = CredentialStore::new(&state).get(auth.user_id, id).await?;

    Ok(Json(DataResponse {
        data: GitLabConfigResponse::from(config),
    }))
}

/// PUT /api/v1/gitlab/configs/{id}
pub async fn update_config(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateCredential>,
) -> AppResult<impl IntoResponse> {
    let view = CredentialStore::new(&state)
        .update(auth.user_id, id, input)
        .await?;

    Ok(Json(DataResponse { data: view }))
}

/// DELETE /api/v1/gitlab/configs/{id}
pub async fn delete_config(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    CredentialStore::new(&state).delete(auth.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/gitlab/configs/{id}/validate
///
/// Re-check the stored token against GitLab and persist the outcome.
pub async fn validate_config(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let view = CredentialStore::new(&state)
        .revalidate(auth.user_id, id)
        .await?;

    Ok(Json(DataResponse { data: view }))
}
