//! CLI client for the shared pixel canvas.
//!
//! Keeps a live view of one canvas over WebSocket, places pixels over HTTP,
//! and reconnects with exponential backoff when the connection drops.

pub mod api;
pub mod canvas;
pub mod error;
pub mod formatter;
pub mod runner;
pub mod session;
pub mod state;
pub mod ui;

pub use runner::{ClientConfig, run_client};
