//! Health and liveness endpoint handlers.
//!
//! These handlers expose server health information for orchestrators
//! (Kubernetes, load balancers) and operational monitoring.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;

/// Returns health information as JSON.
///
/// `registered_requests` counts attribute tables currently held by the
/// store. Under steady load it tracks the number of in-flight requests that
/// stored something; a value that only grows means requests are escaping the
/// lifecycle layer.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let uptime_secs = state.start_time.elapsed().as_secs();

    Json(json!({
        "state": "ready",
        "registered_requests": state.store.len(),
        "shards": state.store.shard_count(),
        "uptime_secs": uptime_secs,
    }))
}

/// Kubernetes liveness probe -- always returns 200 OK.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}
