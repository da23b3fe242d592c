//! Messages repository for database operations.
//!
//! The `messages` table is append-only. Insertion order is the `id`
//! sequence, which is also the order messages are returned in.

use crate::errors::ChatError;
use crate::models::{Message, MessageKind, NewMessage, BROADCAST_RECIPIENT};
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// Repository for message operations.
pub struct MessagesRepository;

impl MessagesRepository {
    /// Append a message.
    #[instrument(skip_all, fields(kind = message.kind.as_db_str()))]
    pub async fn insert(pool: &PgPool, message: &NewMessage) -> Result<Message, ChatError> {
        let start = Instant::now();

        let query_result: Result<(i64,), sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO messages (from_name, to_name, text, message_type, time_of_day)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&message.from)
        .bind(&message.to)
        .bind(&message.text)
        .bind(message.kind.as_db_str())
        .bind(&message.time)
        .fetch_one(pool)
        .await;

        let status = if query_result.is_ok() {
            "success"
        } else {
            "error"
        };
        metrics::record_db_query("insert_message", status, start.elapsed());

        let (id,) = query_result?;

        Ok(Message {
            id,
            from: message.from.clone(),
            to: message.to.clone(),
            text: message.text.clone(),
            kind: message.kind,
            time: message.time.clone(),
        })
    }

    /// Messages visible to `requester`, in insertion order.
    ///
    /// With `limit`, only the most recent `limit` visible messages are
    /// returned (still oldest first).
    #[instrument(skip_all, fields(limit = ?limit))]
    pub async fn list_visible(
        pool: &PgPool,
        requester: &str,
        limit: Option<u64>,
    ) -> Result<Vec<Message>, ChatError> {
        let start = Instant::now();

        let query_result: Result<Vec<MessageRow>, sqlx::Error> = match limit {
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id, from_name, to_name, text, message_type, time_of_day
                    FROM messages
                    WHERE to_name = $1 OR to_name = $2 OR from_name = $2
                    ORDER BY id ASC
                    "#,
                )
                .bind(BROADCAST_RECIPIENT)
                .bind(requester)
                .fetch_all(pool)
                .await
            }
            Some(limit) => {
                sqlx::query_as(
                    r#"
                    SELECT id, from_name, to_name, text, message_type, time_of_day
                    FROM (
                        SELECT id, from_name, to_name, text, message_type, time_of_day
                        FROM messages
                        WHERE to_name = $1 OR to_name = $2 OR from_name = $2
                        ORDER BY id DESC
                        LIMIT $3
                    ) recent
                    ORDER BY id ASC
                    "#,
                )
                .bind(BROADCAST_RECIPIENT)
                .bind(requester)
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(pool)
                .await
            }
        };

        let status = if query_result.is_ok() {
            "success"
        } else {
            "error"
        };
        metrics::record_db_query("list_visible_messages", status, start.elapsed());

        query_result?.into_iter().map(Message::try_from).collect()
    }
}

/// Database row representation for messages.
#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    from_name: String,
    to_name: String,
    text: String,
    message_type: String,
    time_of_day: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = ChatError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let kind = MessageKind::from_db_str(&row.message_type).ok_or_else(|| {
            tracing::error!(
                target: "chat.repository.messages",
                message_id = row.id,
                message_type = %row.message_type,
                "Unknown message type in database"
            );
            ChatError::Internal
        })?;

        Ok(Message {
            id: row.id,
            from: row.from_name,
            to: row.to_name,
            text: row.text,
            kind,
            time: row.time_of_day,
        })
    }
}
