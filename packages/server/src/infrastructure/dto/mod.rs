//! Data Transfer Objects (DTOs) for the canvas server.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket envelope and message DTOs
//! - `http`: HTTP API request / response DTOs

pub mod conversion;
pub mod http;
pub mod websocket;
