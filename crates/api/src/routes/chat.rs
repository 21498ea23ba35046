//! Route definitions for chat.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::chat;
use crate::state::AppState;

/// Routes mounted at `/chat`.
///
/// ```text
/// POST   /                        -> send_message
/// GET    /sessions                -> list_sessions
/// DELETE /sessions/{id}           -> delete_session
/// GET    /sessions/{id}/messages  -> list_messages
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(chat::send_message))
        .route("/sessions", get(chat::list_sessions))
        .route("/sessions/{id}", delete(chat::delete_session))
        .route("/sessions/{id}/messages", get(chat::list_messages))
}
