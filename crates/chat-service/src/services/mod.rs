//! Service layer for the chat service.
//!
//! # Components
//!
//! - `chat_store` - The [`ChatStore`] seam over participant and message storage

pub mod chat_store;

pub use chat_store::memory::InMemoryChatStore;
pub use chat_store::{ChatStore, PgChatStore};
