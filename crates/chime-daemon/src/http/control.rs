use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// POST /stop: ask the daemon to exit. The response is sent before the
/// server finishes draining.
pub async fn stop_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    crate::actions::stop(&state);
    (StatusCode::ACCEPTED, Json(json!({ "status": "stopping" })))
}
