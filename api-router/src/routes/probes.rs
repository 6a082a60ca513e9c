use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Liveness probe: the process is up and serving requests.
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Readiness probe. An `ApiState` only exists once the index view is published,
/// so this always reports the generation currently served.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let stats = state.index.stats().await;
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "checks": { "index": "ok" },
            "index": stats,
        })),
    )
}
