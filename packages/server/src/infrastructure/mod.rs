//! Infrastructure layer: in-memory implementations of the domain interfaces
//! and the wire DTOs.

pub mod cooldown;
pub mod dto;
pub mod identity;
pub mod registry;
pub mod store;
