//! Identity resolver implementations.

pub mod claims;

pub use claims::ClaimsIdentityResolver;
