//! Real-time pixel canvas server library.
//!
//! This library provides the synchronization engine behind a shared pixel grid:
//! room membership, heartbeat liveness, event fan-out, the per-user cooldown
//! gate and the placement pipeline.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
