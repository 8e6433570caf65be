//! HTTP API request / response DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/canvas/{canvasId}/place`.
///
/// `x`, `y` and `color` stay untyped so that a wrong type is reported as a
/// placement validation error instead of a body rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacePixelRequest {
    #[serde(default)]
    pub x: Value,
    #[serde(default)]
    pub y: Value,
    #[serde(default)]
    pub color: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_guest: Option<bool>,
}

impl PlacePixelRequest {
    pub fn new(x: i64, y: i64, color: &str) -> Self {
        Self {
            x: Value::from(x),
            y: Value::from(y),
            color: Value::from(color),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_guest(mut self, is_guest: bool) -> Self {
        self.is_guest = Some(is_guest);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacePixelResponse {
    pub success: bool,
}

/// Body of every non-200 API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    /// Stable snake_case error code
    pub error: String,
    pub message: String,
    /// Set on `rate_limited`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelDto {
    pub x: u32,
    pub y: u32,
    pub color: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Body of `GET /api/canvas/{canvasId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasStateDto {
    pub canvas_id: String,
    pub width: u32,
    pub height: u32,
    pub cooldown_seconds: u64,
    pub allowed_colors: Option<Vec<String>>,
    pub auth_mode: String,
    pub pixels: Vec<PixelDto>,
}

/// Body of `GET /api/canvas/{canvasId}/viewers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerCountDto {
    pub canvas_id: String,
    pub connected_users: usize,
}
