//! UseCase: キャンバス状態の取得
//!
//! 再接続したクライアントはここから全セルを取り直します。
//! 配置はストアへの書き込み完了後にしか成功を返さないため、
//! 成功した配置は直後の取得に必ず含まれます。

use std::sync::Arc;

use crate::domain::{CanvasConfig, CanvasId, ConnectionRegistry, PixelEvent, PixelStore};

use super::error::StateError;

/// キャンバスの設定と全セル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasSnapshot {
    pub config: CanvasConfig,
    pub pixels: Vec<PixelEvent>,
}

/// キャンバス状態取得のユースケース
pub struct GetCanvasStateUseCase {
    store: Arc<dyn PixelStore>,
    registry: Arc<dyn ConnectionRegistry>,
}

impl GetCanvasStateUseCase {
    pub fn new(store: Arc<dyn PixelStore>, registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    /// キャンバスの設定と全セルを取得
    pub async fn execute(&self, canvas_id: &str) -> Result<CanvasSnapshot, StateError> {
        let canvas_id = parse(canvas_id)?;
        let config = self
            .store
            .get_config(&canvas_id)
            .await?
            .ok_or_else(|| StateError::CanvasNotFound(canvas_id.as_str().to_string()))?;
        let pixels = self.store.get_all_pixels(&canvas_id).await?;
        Ok(CanvasSnapshot { config, pixels })
    }

    /// ルームの視聴者数。ルームがなければ 0。
    pub fn viewer_count(&self, canvas_id: &str) -> Result<(CanvasId, usize), StateError> {
        let canvas_id = parse(canvas_id)?;
        let count = self.registry.viewer_count(&canvas_id);
        Ok((canvas_id, count))
    }
}

fn parse(raw: &str) -> Result<CanvasId, StateError> {
    CanvasId::new(raw.to_string()).map_err(|_| StateError::CanvasNotFound(raw.to_string()))
}
