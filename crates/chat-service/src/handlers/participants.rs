//! Participant handlers.
//!
//! - `POST /participants` - Join the room
//! - `GET /participants` - List current participants

use crate::errors::ChatError;
use crate::models::{JoinRequest, NewMessage, Participant};
use crate::routes::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Handler for POST /participants
///
/// Registers a participant under a unique name and announces the join with
/// a `joins` status message to everyone.
///
/// # Response
///
/// - 201 Created: Participant joined (no body)
/// - 409 Conflict: Name already taken
/// - 422 Unprocessable Entity: Body missing, malformed, or `name` empty
///
/// If the announcement fails after the participant was stored, the
/// participant stays joined and the request reports 500.
#[instrument(skip_all, name = "chat.participants.join")]
pub async fn join(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<StatusCode, ChatError> {
    let Json(request) = payload.map_err(|e| ChatError::Validation(e.body_text()))?;

    let name = request
        .name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ChatError::Validation("name must be a non-empty string".to_string()))?;

    let now = Utc::now();
    state.store.insert_participant(&name, now).await?;

    state
        .store
        .insert_message(&NewMessage::joined(&name, now))
        .await
        .map_err(|e| {
            error!(
                target: "chat.handlers.participants",
                name = %name,
                error = %e,
                "Participant joined but the join announcement failed"
            );
            e
        })?;

    info!(
        target: "chat.handlers.participants",
        name = %name,
        "Participant joined"
    );

    Ok(StatusCode::CREATED)
}

/// Handler for GET /participants
///
/// Returns every current participant. No pagination.
#[instrument(skip_all, name = "chat.participants.list")]
pub async fn list_participants(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Participant>>, ChatError> {
    let participants = state.store.list_participants().await?;
    Ok(Json(participants))
}
