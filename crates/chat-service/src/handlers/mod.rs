//! HTTP request handlers for the chat service.

pub mod health;
pub mod messages;
pub mod metrics;
pub mod participants;
pub mod status;

pub use health::health_check;
pub use messages::{list_messages, post_message};
pub use metrics::metrics_handler;
pub use participants::{join, list_participants};
pub use status::heartbeat;

use crate::models::USER_HEADER;
use axum::http::HeaderMap;

/// Name of the requesting participant from the `User` header.
///
/// The raw bytes are read as UTF-8, falling back to Latin-1 (one char per
/// byte) when they are not valid UTF-8. Returns `None` when the header is
/// absent or empty.
pub(crate) fn requester_name(headers: &HeaderMap) -> Option<String> {
    let bytes = headers.get(USER_HEADER)?.as_bytes();
    if bytes.is_empty() {
        return None;
    }

    match std::str::from_utf8(bytes) {
        Ok(name) => Some(name.to_string()),
        Err(_) => Some(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}
