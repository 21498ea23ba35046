//! Handler for `/status` (language model status).

use axum::extract::State;
use axum::Json;
use mergedesk_core::types::Timestamp;
use serde::Serialize;

use crate::response::DataResponse;
use crate::state::AppState;

/// Model status payload.
#[derive(Debug, Serialize)]
pub struct ModelStatus {
    /// `"active"` when the model server answers, otherwise `"inactive"`.
    pub status: &'static str,
    pub model_name: String,
    pub last_updated: Timestamp,
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<AppState>) -> Json<DataResponse<ModelStatus>> {
    let status = if state.llm.is_available().await {
        "active"
    } else {
        "inactive"
    };

    Json(DataResponse {
        data: ModelStatus {
            status,
            model_name: state.llm.model_name().to_string(),
            last_updated: chrono::Utc::now(),
        },
    })
}
