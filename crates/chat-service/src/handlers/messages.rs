//! Message handlers.
//!
//! - `POST /messages` - Post a broadcast or private message
//! - `GET /messages` - Read the messages visible to the requester
//!
//! Both identify the requester by the `User` header.

use crate::errors::ChatError;
use crate::handlers::requester_name;
use crate::models::{
    format_time_of_day, parse_limit, ListMessagesQuery, Message, MessageKind, NewMessage,
    PostMessageRequest,
};
use crate::routes::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Handler for POST /messages
///
/// # Validation
///
/// Checked in order, first failure wins:
/// 1. `type` is `message` or `private_message`
/// 2. `User` header is present
/// 3. `to` and `text` are non-empty strings
/// 4. The sender is a current participant
///
/// # Response
///
/// - 201 Created: Message stored (no body)
/// - 422 Unprocessable Entity: Any validation failure
#[instrument(skip_all, name = "chat.messages.post")]
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<StatusCode, ChatError> {
    let Json(request) = payload.map_err(|e| ChatError::Validation(e.body_text()))?;

    let kind = request
        .kind
        .as_deref()
        .and_then(MessageKind::from_client_str)
        .ok_or_else(|| {
            ChatError::Validation("type must be 'message' or 'private_message'".to_string())
        })?;

    let from = requester_name(&headers)
        .ok_or_else(|| ChatError::Validation("User header is required".to_string()))?;

    let to = non_empty(request.to)
        .ok_or_else(|| ChatError::Validation("to must be a non-empty string".to_string()))?;
    let text = non_empty(request.text)
        .ok_or_else(|| ChatError::Validation("text must be a non-empty string".to_string()))?;

    if state.store.find_participant(&from).await?.is_none() {
        debug!(
            target: "chat.handlers.messages",
            from = %from,
            "Rejected message from unknown sender"
        );
        return Err(ChatError::Validation("Unknown sender".to_string()));
    }

    let message = NewMessage {
        from,
        to,
        text,
        kind,
        time: format_time_of_day(Utc::now()),
    };
    let stored = state.store.insert_message(&message).await?;

    info!(
        target: "chat.handlers.messages",
        message_id = stored.id,
        kind = stored.kind.as_db_str(),
        "Message posted"
    );

    Ok(StatusCode::CREATED)
}

/// Handler for GET /messages
///
/// Returns broadcasts plus the messages the requester sent or received, in
/// insertion order. With `?limit=N` only the most recent `N` are returned.
/// An empty `limit` is treated as absent.
///
/// # Response
///
/// - 200 OK: Array of messages
/// - 403 Forbidden: `User` header missing or not a current participant
/// - 422 Unprocessable Entity: `limit` is not a positive integer
#[instrument(skip_all, name = "chat.messages.list")]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<ListMessagesQuery>, QueryRejection>,
) -> Result<Json<Vec<Message>>, ChatError> {
    let requester = requester_name(&headers)
        .ok_or_else(|| ChatError::Forbidden("User header is required".to_string()))?;

    if state.store.find_participant(&requester).await?.is_none() {
        return Err(ChatError::Forbidden("Unknown participant".to_string()));
    }

    let Query(query) = query.map_err(|e| ChatError::Validation(e.body_text()))?;
    let limit = match query.limit.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(parse_limit(raw).ok_or_else(|| {
            ChatError::Validation("limit must be a positive integer".to_string())
        })?),
    };

    let messages = state.store.visible_messages(&requester, limit).await?;
    Ok(Json(messages))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
