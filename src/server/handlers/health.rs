use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "provider": state.llm.provider_name(),
        "model": state.settings.llm.model,
        "nodes": state.node_count,
        "started_at": state.started_at.to_rfc3339(),
    }))
}
