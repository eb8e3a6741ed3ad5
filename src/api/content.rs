use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::services::content_store::validate_content_ref;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:content_ref", get(fetch_content))
}

async fn fetch_content(
    Path(content_ref): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    validate_content_ref(&content_ref).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let value = state
        .content()
        .fetch_json(&content_ref)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch content"))?;

    Ok(Json(value))
}
