//! Participants repository for database operations.
//!
//! # Security
//!
//! - All queries use parameterized statements
//! - Name uniqueness is enforced by the `participants_name_key` unique index;
//!   a violation is reported as `ChatError::Conflict`

use crate::errors::ChatError;
use crate::models::Participant;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Repository for participant operations.
pub struct ParticipantsRepository;

impl ParticipantsRepository {
    /// Insert a new participant with `last_status = now`.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Conflict` if the name is already taken and
    /// `ChatError::Database` on other failures.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn insert(
        pool: &PgPool,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Participant, ChatError> {
        let start = Instant::now();
        let id = Uuid::new_v4();

        let query_result = sqlx::query(
            r#"
            INSERT INTO participants (id, name, last_status_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(now)
        .execute(pool)
        .await;

        record("insert_participant", start, &query_result);

        match query_result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::debug!(
                    target: "chat.repository.participants",
                    name = %name,
                    "Participant name already taken"
                );
                return Err(ChatError::Conflict("Name already taken".to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Participant {
            id,
            name: name.to_string(),
            last_status: now,
        })
    }

    /// Find a participant by name.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Participant>, ChatError> {
        let start = Instant::now();

        let query_result: Result<Option<ParticipantRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, name, last_status_at
            FROM participants
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(pool)
        .await;

        record("find_participant", start, &query_result);

        Ok(query_result?.map(Participant::from))
    }

    /// List every participant, oldest registration first.
    #[instrument(skip_all)]
    pub async fn list(pool: &PgPool) -> Result<Vec<Participant>, ChatError> {
        let start = Instant::now();

        let query_result: Result<Vec<ParticipantRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, name, last_status_at
            FROM participants
            ORDER BY created_at ASC, name ASC
            "#,
        )
        .fetch_all(pool)
        .await;

        record("list_participants", start, &query_result);

        Ok(query_result?.into_iter().map(Participant::from).collect())
    }

    /// Record a heartbeat for `name`.
    ///
    /// # Returns
    ///
    /// Returns `true` if a row was updated, `false` if no such participant.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn touch(pool: &PgPool, name: &str, now: DateTime<Utc>) -> Result<bool, ChatError> {
        let start = Instant::now();

        let query_result = sqlx::query(
            r#"
            UPDATE participants
            SET last_status_at = $2
            WHERE name = $1
            "#,
        )
        .bind(name)
        .bind(now)
        .execute(pool)
        .await;

        record("touch_participant", start, &query_result);

        Ok(query_result?.rows_affected() > 0)
    }

    /// Participants whose last heartbeat is older than `cutoff`.
    #[instrument(skip_all)]
    pub async fn find_stale(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Participant>, ChatError> {
        let start = Instant::now();

        let query_result: Result<Vec<ParticipantRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, name, last_status_at
            FROM participants
            WHERE last_status_at < $1
            ORDER BY last_status_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await;

        record("find_stale_participants", start, &query_result);

        Ok(query_result?.into_iter().map(Participant::from).collect())
    }

    /// Delete a participant, but only while it is still older than `cutoff`.
    ///
    /// A heartbeat landing between [`Self::find_stale`] and this call keeps
    /// the participant.
    ///
    /// # Returns
    ///
    /// Returns `true` if the participant was deleted.
    #[instrument(skip_all, fields(participant_id = %id))]
    pub async fn delete_if_stale(
        pool: &PgPool,
        id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, ChatError> {
        let start = Instant::now();

        let query_result = sqlx::query(
            r#"
            DELETE FROM participants
            WHERE id = $1 AND last_status_at < $2
            "#,
        )
        .bind(id)
        .bind(cutoff)
        .execute(pool)
        .await;

        record("delete_stale_participant", start, &query_result);

        Ok(query_result?.rows_affected() > 0)
    }
}

fn record<T>(operation: &'static str, start: Instant, result: &Result<T, sqlx::Error>) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_db_query(operation, status, start.elapsed());
}

/// Database row representation for participants.
#[derive(sqlx::FromRow)]
struct ParticipantRow {
    id: Uuid,
    name: String,
    last_status_at: DateTime<Utc>,
}

impl From<ParticipantRow> for Participant {
    fn from(row: ParticipantRow) -> Self {
        Participant {
            id: row.id,
            name: row.name,
            last_status: row.last_status_at,
        }
    }
}
