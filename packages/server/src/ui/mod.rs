//! HTTP / WebSocket surface of the canvas server.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::{Server, ServerConfig, ServerError};
pub use signal::shutdown_signal;
