//! Domain errors.

use thiserror::Error;

/// Value object construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} has an invalid format: '{value}'")]
    InvalidFormat { field: &'static str, value: String },
}

/// A placement request broke one of the canvas rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementViolation {
    #[error("coordinates are out of bounds or not integers")]
    InvalidCoordinates,

    #[error("color must match #RRGGBB")]
    InvalidColor,

    #[error("color is not in this canvas's palette")]
    ColorNotAllowed,

    #[error("an identity is required to place pixels on this canvas")]
    Unauthorized,

    #[error("guests may not place pixels on this canvas")]
    Forbidden,
}

/// Pixel / canvas-config store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("canvas '{0}' not found")]
    CanvasNotFound(String),
}
