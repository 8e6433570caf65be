//! Cooldown gate implementations.
//!
//! Cooldown state lives in process memory only; a restart resets every
//! cooldown.

pub mod inmemory;

pub use inmemory::InMemoryCooldownGate;
