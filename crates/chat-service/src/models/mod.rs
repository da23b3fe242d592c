//! Chat service models.
//!
//! Contains the participant and message records, request payloads, and the
//! small pure rules (visibility, limit parsing, time formatting) shared by the
//! handlers and store implementations.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved recipient meaning "every current participant".
pub const BROADCAST_RECIPIENT: &str = "Todos";

/// Status text appended when a participant joins.
pub const JOIN_STATUS_TEXT: &str = "joins";

/// Status text appended when a participant is evicted.
pub const LEAVE_STATUS_TEXT: &str = "leaves";

/// Header naming the participant on whose behalf a request is made.
pub const USER_HEADER: &str = "user";

/// Kind of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Ordinary message, normally addressed to the broadcast recipient.
    Message,

    /// Message addressed to a single participant.
    PrivateMessage,

    /// System-generated join/leave record.
    Status,
}

impl MessageKind {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MessageKind::Message => "message",
            MessageKind::PrivateMessage => "private_message",
            MessageKind::Status => "status",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "message" => Some(MessageKind::Message),
            "private_message" => Some(MessageKind::PrivateMessage),
            "status" => Some(MessageKind::Status),
            _ => None,
        }
    }

    /// Parse a kind a client is allowed to post. `status` is reserved.
    pub fn from_client_str(s: &str) -> Option<Self> {
        match s {
            "message" => Some(MessageKind::Message),
            "private_message" => Some(MessageKind::PrivateMessage),
            _ => None,
        }
    }
}

/// A registered chat participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Store-assigned identifier.
    pub id: Uuid,

    /// Display name, unique across participants.
    pub name: String,

    /// Time of the last heartbeat (epoch milliseconds on the wire).
    #[serde(rename = "lastStatus", with = "chrono::serde::ts_milliseconds")]
    pub last_status: DateTime<Utc>,
}

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Insertion sequence number.
    pub id: i64,

    /// Sender name.
    pub from: String,

    /// Recipient name or [`BROADCAST_RECIPIENT`].
    pub to: String,

    /// Message body.
    pub text: String,

    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Time of day the message was posted, `HH:MM:SS`.
    pub time: String,
}

impl Message {
    /// Whether `requester` may read this message.
    ///
    /// Broadcasts are visible to everyone; anything else only to its sender
    /// and its recipient.
    pub fn is_visible_to(&self, requester: &str) -> bool {
        self.to == BROADCAST_RECIPIENT || self.to == requester || self.from == requester
    }
}

/// A message about to be appended to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub from: String,
    pub to: String,
    pub text: String,
    pub kind: MessageKind,
    pub time: String,
}

impl NewMessage {
    /// Status message announcing `name` joining.
    pub fn joined(name: &str, now: DateTime<Utc>) -> Self {
        Self::status(name, JOIN_STATUS_TEXT, now)
    }

    /// Status message announcing `name` leaving.
    pub fn left(name: &str, now: DateTime<Utc>) -> Self {
        Self::status(name, LEAVE_STATUS_TEXT, now)
    }

    fn status(name: &str, text: &str, now: DateTime<Utc>) -> Self {
        Self {
            from: name.to_string(),
            to: BROADCAST_RECIPIENT.to_string(),
            text: text.to_string(),
            kind: MessageKind::Status,
            time: format_time_of_day(now),
        }
    }
}

/// Format a timestamp as local wall-clock `HH:MM:SS`.
pub fn format_time_of_day(now: DateTime<Utc>) -> String {
    now.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Parse the `limit` query parameter.
///
/// Accepts only positive integers without sign or leading zeros. Values too
/// large for `u64` saturate, since they select everything anyway.
pub fn parse_limit(raw: &str) -> Option<u64> {
    let mut chars = raw.chars();
    let first = chars.next()?;
    if !('1'..='9').contains(&first) || !chars.all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(raw.parse::<u64>().unwrap_or(u64::MAX))
}

/// Keep only the last `limit` items of `items`, preserving order.
pub fn take_last<T>(mut items: Vec<T>, limit: Option<u64>) -> Vec<T> {
    if let Some(limit) = limit {
        let keep = usize::try_from(limit).unwrap_or(usize::MAX);
        if items.len() > keep {
            items.drain(..items.len() - keep);
        }
    }
    items
}

// ============================================================================
// Request / Response Payloads
// ============================================================================

/// Request body for `POST /participants`.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRequest {
    pub name: Option<String>,
}

/// Request body for `POST /messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct PostMessageRequest {
    pub to: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Query string for `GET /messages`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<String>,
}

/// Health check response.
///
/// Returned by the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Store connectivity status.
    pub database: String,
}
