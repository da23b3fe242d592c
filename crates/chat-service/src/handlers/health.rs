//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Health check handler.
///
/// Pings the store and reports the result. Always 200, so probes see a body
/// even when the store is down.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "healthy"
/// }
/// ```
#[instrument(skip_all, name = "chat.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let healthy = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(target: "chat.handlers.health", error = %e, "Store ping failed");
            false
        }
    };

    let status = if healthy { "healthy" } else { "unhealthy" };

    Json(HealthResponse {
        status: status.to_string(),
        database: status.to_string(),
    })
}
