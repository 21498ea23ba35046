pub mod auth;
pub mod chat;
pub mod gitlab_config;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                       register (public)
/// /auth/login                          login (public)
/// /auth/me                             current user
///
/// /gitlab/configs                      list, create
/// /gitlab/configs/{id}                 get, update, delete
/// /gitlab/configs/{id}/validate        re-validate stored token (POST)
///
/// /chat                                send message (POST)
/// /chat/sessions                       list sessions
/// /chat/sessions/{id}                  delete session
/// /chat/sessions/{id}/messages         session messages
///
/// /status                              language model status (public)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/gitlab/configs", gitlab_config::router())
        .nest("/chat", chat::router())
        .route("/status", get(handlers::status::get_status))
}
