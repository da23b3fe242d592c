//! Background tasks for the chat service.
//!
//! # Tasks
//!
//! - `liveness_sweeper` - Evicts participants that stopped sending heartbeats

pub mod liveness_sweeper;

pub use liveness_sweeper::{
    start_liveness_sweeper, sweep_once, LivenessSweeper, SweepOutcome, SweeperConfig,
    SweeperHandle,
};
