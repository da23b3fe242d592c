//! # Chat Test Utilities
//!
//! Shared test utilities for the chat service.
//!
//! This crate provides:
//! - Server test harness (`TestChatServer` for E2E tests), backed by either
//!   the in-memory store or a PostgreSQL pool
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_test_utils::*;
//!
//! #[sqlx::test(migrations = "../../migrations")]
//! async fn test_example(pool: PgPool) -> Result<()> {
//!     let server = TestChatServer::spawn_with_pool(pool).await?;
//!
//!     let response = reqwest::get(format!("{}/health", server.url())).await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

pub use server_harness::*;
