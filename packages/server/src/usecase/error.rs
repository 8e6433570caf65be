//! UseCase layer errors.

use thiserror::Error;

use crate::domain::{PlacementViolation, StoreError};

/// 参加処理のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("a canvas id is required to join a room")]
    InvalidRoom,
}

/// ピクセル配置処理のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceError {
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

    #[error("cooldown active, retry in {retry_after_ms} ms")]
    RateLimited { retry_after_ms: i64 },

    #[error("canvas '{0}' not found")]
    CanvasNotFound(String),

    #[error("store failure: {0}")]
    Store(String),
}

impl From<PlacementViolation> for PlaceError {
    fn from(violation: PlacementViolation) -> Self {
        match violation {
            PlacementViolation::InvalidCoordinates => PlaceError::InvalidCoordinates,
            PlacementViolation::InvalidColor => PlaceError::InvalidColor,
            PlacementViolation::ColorNotAllowed => PlaceError::ColorNotAllowed,
            PlacementViolation::Unauthorized => PlaceError::Unauthorized,
            PlacementViolation::Forbidden => PlaceError::Forbidden,
        }
    }
}

impl From<StoreError> for PlaceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::CanvasNotFound(id) => PlaceError::CanvasNotFound(id),
            StoreError::Unavailable(reason) => PlaceError::Store(reason),
        }
    }
}

/// キャンバス状態取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("canvas '{0}' not found")]
    CanvasNotFound(String),

    #[error("store failure: {0}")]
    Store(String),
}

impl From<StoreError> for StateError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::CanvasNotFound(id) => StateError::CanvasNotFound(id),
            StoreError::Unavailable(reason) => StateError::Store(reason),
        }
    }
}
