//! Route definitions for stored GitLab configurations.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::gitlab_config;
use crate::state::AppState;

/// Routes mounted at `/gitlab/configs`.
///
/// ```text
/// GET    /                -> list_configs
/// POST   /                -> create_config
/// GET    /{id}            -> get_config
/// PUT    /{id}            -> update_config
/// DELETE /{id}            -> delete_config
/// POST   /{id}/validate   -> validate_config
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(gitlab_config::list_configs).post(gitlab_config::create_config),
        )
        .route(
            "/{id}",
            get(gitlab_config::get_config)
                .put(gitlab_config::update_config)
                .delete(gitlab_config::delete_config),
        )
        .route("/{id}/validate", post(gitlab_config::validate_config))
}
