//! Conversion logic between DTOs and domain entities.

use crate::domain::{CanvasConfig, IdentityClaims, PixelEvent};
use crate::infrastructure::dto::{
    http::{CanvasStateDto, PixelDto, PlacePixelRequest},
    websocket::PixelPlacedData,
};

// ========================================
// DTO → Domain Entity
// ========================================

impl From<&PlacePixelRequest> for IdentityClaims {
    fn from(dto: &PlacePixelRequest) -> Self {
        Self {
            user_id: dto.user_id.clone(),
            username: dto.username.clone(),
            is_guest: dto.is_guest,
        }
    }
}

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&PixelEvent> for PixelPlacedData {
    fn from(model: &PixelEvent) -> Self {
        Self {
            canvas_id: model.canvas_id.as_str().to_string(),
            x: model.x,
            y: model.y,
            color: model.color.as_str().to_string(),
            timestamp: model.timestamp.value(),
            user_id: model
                .author
                .as_ref()
                .map(|a| a.user_id.as_str().to_string()),
            username: model.author.as_ref().map(|a| a.username.clone()),
        }
    }
}

impl From<&PixelEvent> for PixelDto {
    fn from(model: &PixelEvent) -> Self {
        Self {
            x: model.x,
            y: model.y,
            color: model.color.as_str().to_string(),
            timestamp: model.timestamp.value(),
            user_id: model
                .author
                .as_ref()
                .map(|a| a.user_id.as_str().to_string()),
            username: model.author.as_ref().map(|a| a.username.clone()),
        }
    }
}

impl CanvasStateDto {
    pub fn new(config: &CanvasConfig, pixels: &[PixelEvent]) -> Self {
        Self {
            canvas_id: config.canvas_id.as_str().to_string(),
            width: config.width,
            height: config.height,
            cooldown_seconds: config.cooldown_seconds,
            allowed_colors: config
                .allowed_colors
                .as_ref()
                .map(|palette| palette.iter().map(|c| c.as_str().to_string()).collect()),
            auth_mode: config.auth_mode.as_str().to_string(),
            pixels: pixels.iter().map(PixelDto::from).collect(),
        }
    }
}
