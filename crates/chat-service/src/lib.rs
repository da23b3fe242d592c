//! Chat Service Library
//!
//! Backend for a single chat room:
//!
//! - Participants join under a unique display name
//! - Broadcast and private messages with per-requester visibility
//! - Heartbeats keep participants alive; a background sweeper evicts the
//!   silent ones and announces their departure
//!
//! # Architecture
//!
//! Handler -> Store -> Repository:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/chat_store.rs -> repositories/*.rs
//!                                         ^
//!                  tasks/liveness_sweeper.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Records, payloads, and visibility/limit rules
//! - `observability` - Prometheus metric recording
//! - `repositories` - PostgreSQL queries
//! - `routes` - Axum router setup
//! - `services` - The `ChatStore` seam and its implementations
//! - `tasks` - Liveness sweeper

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod tasks;
