//! Handlers for `/chat` and chat session history.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use mergedesk_core::error::CoreError;
use mergedesk_core::types::DbId;
use mergedesk_db::repositories::{ChatMessageRepo, ChatSessionRepo};

use crate::chat::service::{ChatRequest, ChatService};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/chat
///
/// Send one message. Slash commands and GitLab requests are answered
/// directly; anything else goes to the language model.
pub async fn send_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ChatRequest>,
) -> AppResult<impl IntoResponse> {
    let reply = ChatService::new(&state).send(auth.user_id, input).await?;
    Ok(Json(DataResponse { data: reply }))
}

/// GET /api/v1/chat/sessions
pub async fn list_sessions(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let sessions = ChatSessionRepo::list_for_user(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: sessions }))
}

/// GET /api/v1/chat/sessions/{id}/messages
pub async fn list_messages(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ChatSessionRepo::find_by_id(&state.pool, auth.user_id, session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;

    let messages = ChatMessageRepo::list_for_session(&state.pool, session_id).await?;
    Ok(Json(DataResponse { data: messages }))
}

/// DELETE /api/v1/chat/sessions/{id}
pub async fn delete_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !ChatSessionRepo::delete(&state.pool, auth.user_id, session_id).await? {
        return Err(session_not_found(session_id));
    }
    tracing::info!(user_id = %auth.user_id, session_id = %session_id, "Chat session deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn session_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Chat session",
        id,
    })
}
