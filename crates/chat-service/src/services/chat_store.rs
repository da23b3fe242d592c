//! Chat store seam.
//!
//! Handlers and the liveness sweeper talk to storage only through
//! [`ChatStore`], handed to them at construction time. Two implementations:
//!
//! - [`PgChatStore`]: PostgreSQL via the repositories (production)
//! - [`memory::InMemoryChatStore`]: process-local store for tests and local runs
//!
//! Each method is an independent store operation. Nothing here spans two
//! operations in a transaction.

use crate::errors::ChatError;
use crate::models::{Message, NewMessage, Participant};
use crate::repositories::{MessagesRepository, ParticipantsRepository};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

/// Storage operations used by the chat service.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), ChatError>;

    /// Insert a participant. Fails with `ChatError::Conflict` if the name is taken.
    async fn insert_participant(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Participant, ChatError>;

    /// Look up a participant by name.
    async fn find_participant(&self, name: &str) -> Result<Option<Participant>, ChatError>;

    /// All current participants.
    async fn list_participants(&self) -> Result<Vec<Participant>, ChatError>;

    /// Set `last_status = now` for `name`. Returns `false` if there is no such participant.
    async fn touch_participant(&self, name: &str, now: DateTime<Utc>) -> Result<bool, ChatError>;

    /// Participants whose last heartbeat is older than `cutoff`.
    async fn find_stale_participants(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Participant>, ChatError>;

    /// Delete participant `id` if its last heartbeat is still older than `cutoff`.
    async fn remove_stale_participant(
        &self,
        id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, ChatError>;

    /// Append a message.
    async fn insert_message(&self, message: &NewMessage) -> Result<Message, ChatError>;

    /// Messages visible to `requester` in insertion order, optionally only the last `limit`.
    async fn visible_messages(
        &self,
        requester: &str,
        limit: Option<u64>,
    ) -> Result<Vec<Message>, ChatError>;
}

/// PostgreSQL-backed chat store.
#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl ChatStore for PgChatStore {
    #[instrument(skip_all)]
    async fn ping(&self) -> Result<(), ChatError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_participant(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Participant, ChatError> {
        ParticipantsRepository::insert(&self.pool, name, now).await
    }

    async fn find_participant(&self, name: &str) -> Result<Option<Participant>, ChatError> {
        ParticipantsRepository::find_by_name(&self.pool, name).await
    }

    async fn list_participants(&self) -> Result<Vec<Participant>, ChatError> {
        ParticipantsRepository::list(&self.pool).await
    }

    async fn touch_participant(&self, name: &str, now: DateTime<Utc>) -> Result<bool, ChatError> {
        ParticipantsRepository::touch(&self.pool, name, now).await
    }

    async fn find_stale_participants(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Participant>, ChatError> {
        ParticipantsRepository::find_stale(&self.pool, cutoff).await
    }

    async fn remove_stale_participant(
        &self,
        id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, ChatError> {
        ParticipantsRepository::delete_if_stale(&self.pool, id, cutoff).await
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message, ChatError> {
        MessagesRepository::insert(&self.pool, message).await
    }

    async fn visible_messages(
        &self,
        requester: &str,
        limit: Option<u64>,
    ) -> Result<Vec<Message>, ChatError> {
        MessagesRepository::list_visible(&self.pool, requester, limit).await
    }
}

/// In-memory chat store.
///
/// Keeps both collections behind one lock, so every operation is atomic.
/// Failure injection switches let tests exercise the error paths.
pub mod memory {
    use super::*;
    use crate::models::take_last;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct State {
        participants: Vec<Participant>,
        messages: Vec<Message>,
        next_message_id: i64,
        failing_evictions: HashSet<String>,
    }

    /// Process-local [`ChatStore`].
    #[derive(Default)]
    pub struct InMemoryChatStore {
        state: RwLock<State>,
        fail_all: AtomicBool,
        fail_message_inserts: AtomicBool,
    }

    impl InMemoryChatStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a store where every operation fails as if unreachable.
        pub fn failing() -> Self {
            let store = Self::default();
            store.set_failing(true);
            store
        }

        /// Toggle whole-store failure.
        pub fn set_failing(&self, failing: bool) {
            self.fail_all.store(failing, Ordering::SeqCst);
        }

        /// Toggle failure of message inserts only.
        pub fn set_failing_message_inserts(&self, failing: bool) {
            self.fail_message_inserts.store(failing, Ordering::SeqCst);
        }

        /// Make evicting participant `name` fail.
        pub async fn fail_evictions_for(&self, name: &str) {
            self.state
                .write()
                .await
                .failing_evictions
                .insert(name.to_string());
        }

        /// Overwrite a participant's last heartbeat. Returns `false` if unknown.
        pub async fn set_last_status(&self, name: &str, at: DateTime<Utc>) -> bool {
            let mut state = self.state.write().await;
            match state.participants.iter_mut().find(|p| p.name == name) {
                Some(participant) => {
                    participant.last_status = at;
                    true
                }
                None => false,
            }
        }

        /// Every stored message, regardless of visibility.
        pub async fn all_messages(&self) -> Vec<Message> {
            self.state.read().await.messages.clone()
        }

        fn check_available(&self) -> Result<(), ChatError> {
            if self.fail_all.load(Ordering::SeqCst) {
                return Err(ChatError::Database("in-memory store unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl ChatStore for InMemoryChatStore {
        async fn ping(&self) -> Result<(), ChatError> {
            self.check_available()
        }

        async fn insert_participant(
            &self,
            name: &str,
            now: DateTime<Utc>,
        ) -> Result<Participant, ChatError> {
            self.check_available()?;
            let mut state = self.state.write().await;

            if state.participants.iter().any(|p| p.name == name) {
                return Err(ChatError::Conflict("Name already taken".to_string()));
            }

            let participant = Participant {
                id: Uuid::new_v4(),
                name: name.to_string(),
                last_status: now,
            };
            state.participants.push(participant.clone());
            Ok(participant)
        }

        async fn find_participant(&self, name: &str) -> Result<Option<Participant>, ChatError> {
            self.check_available()?;
            let state = self.state.read().await;
            Ok(state.participants.iter().find(|p| p.name == name).cloned())
        }

        async fn list_participants(&self) -> Result<Vec<Participant>, ChatError> {
            self.check_available()?;
            Ok(self.state.read().await.participants.clone())
        }

        async fn touch_participant(
            &self,
            name: &str,
            now: DateTime<Utc>,
        ) -> Result<bool, ChatError> {
            self.check_available()?;
            Ok(self.set_last_status(name, now).await)
        }

        async fn find_stale_participants(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<Participant>, ChatError> {
            self.check_available()?;
            let state = self.state.read().await;
            Ok(state
                .participants
                .iter()
                .filter(|p| p.last_status < cutoff)
                .cloned()
                .collect())
        }

        async fn remove_stale_participant(
            &self,
            id: Uuid,
            cutoff: DateTime<Utc>,
        ) -> Result<bool, ChatError> {
            self.check_available()?;
            let mut state = self.state.write().await;

            let Some(position) = state
                .participants
                .iter()
                .position(|p| p.id == id && p.last_status < cutoff)
            else {
                return Ok(false);
            };

            let is_failing = state
                .participants
                .get(position)
                .is_some_and(|p| state.failing_evictions.contains(&p.name));
            if is_failing {
                return Err(ChatError::Database("eviction failed".to_string()));
            }

            state.participants.remove(position);
            Ok(true)
        }

        async fn insert_message(&self, message: &NewMessage) -> Result<Message, ChatError> {
            self.check_available()?;
            if self.fail_message_inserts.load(Ordering::SeqCst) {
                return Err(ChatError::Database("message insert failed".to_string()));
            }

            let mut state = self.state.write().await;
            state.next_message_id += 1;

            let stored = Message {
                id: state.next_message_id,
                from: message.from.clone(),
                to: message.to.clone(),
                text: message.text.clone(),
                kind: message.kind,
                time: message.time.clone(),
            };
            state.messages.push(stored.clone());
            Ok(stored)
        }

        async fn visible_messages(
            &self,
            requester: &str,
            limit: Option<u64>,
        ) -> Result<Vec<Message>, ChatError> {
            self.check_available()?;
            let state = self.state.read().await;
            let visible: Vec<Message> = state
                .messages
                .iter()
                .filter(|m| m.is_visible_to(requester))
                .cloned()
                .collect();
            Ok(take_last(visible, limit))
        }
    }

}
