//! Heartbeat handler.

use crate::errors::ChatError;
use crate::handlers::requester_name;
use crate::routes::AppState;
use axum::{extract::State, http::HeaderMap, http::StatusCode};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Handler for POST /status
///
/// Resets the requester's inactivity clock.
///
/// # Response
///
/// - 200 OK: Heartbeat recorded (no body)
/// - 404 Not Found: `User` header missing or not a current participant
#[instrument(skip_all, name = "chat.status.heartbeat")]
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ChatError> {
    let name = requester_name(&headers)
        .ok_or_else(|| ChatError::NotFound("User header is required".to_string()))?;

    if !state.store.touch_participant(&name, Utc::now()).await? {
        return Err(ChatError::NotFound("Unknown participant".to_string()));
    }

    debug!(target: "chat.handlers.status", name = %name, "Heartbeat recorded");

    Ok(StatusCode::OK)
}
