//! Pixel store interface.
//!
//! The durable store is an external collaborator; the server only needs
//! config reads, full-canvas reads and single-cell upserts.

use async_trait::async_trait;

use super::{
    entity::{CanvasConfig, PixelEvent},
    error::StoreError,
    value_object::CanvasId,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PixelStore: Send + Sync {
    /// Canvas configuration, `None` for unknown canvases.
    async fn get_config(&self, canvas_id: &CanvasId) -> Result<Option<CanvasConfig>, StoreError>;

    /// Current value of every painted cell.
    async fn get_all_pixels(&self, canvas_id: &CanvasId) -> Result<Vec<PixelEvent>, StoreError>;

    /// Overwrite the cell at `(pixel.x, pixel.y)`. The last write wins.
    async fn upsert_pixel(&self, pixel: &PixelEvent) -> Result<(), StoreError>;
}
