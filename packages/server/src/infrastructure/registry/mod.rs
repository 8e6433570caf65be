//! Connection registry implementations.

pub mod inmemory;

pub use inmemory::{HEARTBEAT_TIMEOUT_CLOSE_CODE, InMemoryConnectionRegistry};
