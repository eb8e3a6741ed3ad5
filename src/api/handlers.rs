use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let api = state.settings().api();
    Json(RootResponse {
        message: api.project_name.clone(),
        version: api.version.clone(),
        api_prefix: api.api_v1_str.clone(),
    })
}

/// Reports which backends are wired; remote reachability is not probed.
pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut components = BTreeMap::new();
    let backend = |present: bool| if present { "configured" } else { "not_configured" };

    components.insert("ledger".to_string(), backend(state.ledger().is_some()).to_string());
    components.insert(
        "content".to_string(),
        format!("{:?}", state.settings().content().backend).to_lowercase(),
    );
    components.insert("extraction".to_string(), backend(state.extractor().is_some()).to_string());

    let status = if state.ledger().is_some() { "healthy" } else { "degraded" };

    Json(HealthResponse {
        service: "examchain-api".to_string(),
        status: status.to_string(),
        components,
    })
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
