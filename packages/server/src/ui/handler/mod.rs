//! Request handlers.

mod error;
mod http;
mod websocket;

pub use http::{get_canvas, get_viewers, health_check, place_pixel};
pub use websocket::websocket_handler;
