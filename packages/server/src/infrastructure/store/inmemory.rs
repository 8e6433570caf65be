//! InMemory PixelStore 実装
//!
//! 永続ストアの代わりにプロセス内の `HashMap` を使用します。
//! セルごとに最新の `PixelEvent` を 1 つだけ保持し、upsert は上書き（後勝ち）です。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{CanvasConfig, CanvasId, PixelEvent, PixelStore, StoreError};

struct CanvasRecord {
    config: CanvasConfig,
    cells: HashMap<(u32, u32), PixelEvent>,
}

/// インメモリ PixelStore 実装
#[derive(Default)]
pub struct InMemoryPixelStore {
    canvases: RwLock<HashMap<CanvasId, CanvasRecord>>,
}

impl InMemoryPixelStore {
    /// 新しい InMemoryPixelStore を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 初期キャンバスを登録した InMemoryPixelStore を作成
    pub fn with_canvases(configs: impl IntoIterator<Item = CanvasConfig>) -> Self {
        let canvases = configs
            .into_iter()
            .map(|config| {
                (
                    config.canvas_id.clone(),
                    CanvasRecord {
                        config,
                        cells: HashMap::new(),
                    },
                )
            })
            .collect();
        Self {
            canvases: RwLock::new(canvases),
        }
    }

    /// キャンバス設定を登録（既存の場合は設定のみ置き換え、セルは保持）
    pub async fn put_config(&self, config: CanvasConfig) {
        let mut canvases = self.canvases.write().await;
        match canvases.get_mut(&config.canvas_id) {
            Some(record) => record.config = config,
            None => {
                canvases.insert(
                    config.canvas_id.clone(),
                    CanvasRecord {
                        config,
                        cells: HashMap::new(),
                    },
                );
            }
        }
    }
}

#[async_trait]
impl PixelStore for InMemoryPixelStore {
    async fn get_config(&self, canvas_id: &CanvasId) -> Result<Option<CanvasConfig>, StoreError> {
        let canvases = self.canvases.read().await;
        Ok(canvases.get(canvas_id).map(|record| record.config.clone()))
    }

    async fn get_all_pixels(&self, canvas_id: &CanvasId) -> Result<Vec<PixelEvent>, StoreError> {
        let canvases = self.canvases.read().await;
        let record = canvases
            .get(canvas_id)
            .ok_or_else(|| StoreError::CanvasNotFound(canvas_id.to_string()))?;

        let mut pixels: Vec<PixelEvent> = record.cells.values().cloned().collect();
        pixels.sort_by_key(|pixel| (pixel.y, pixel.x));
        Ok(pixels)
    }

    async fn upsert_pixel(&self, pixel: &PixelEvent) -> Result<(), StoreError> {
        let mut canvases = self.canvases.write().await;
        let record = canvases
            .get_mut(&pixel.canvas_id)
            .ok_or_else(|| StoreError::CanvasNotFound(pixel.canvas_id.to_string()))?;
        record.cells.insert((pixel.x, pixel.y), pixel.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuthMode, Author, HexColor, Timestamp, UserId};

    fn config(id: &str) -> CanvasConfig {
        CanvasConfig {
            canvas_id: CanvasId::new(id.to_string()).unwrap(),
            width: 10,
            height: 10,
            cooldown_seconds: 5,
            allowed_colors: None,
            auth_mode: AuthMode::Anyone,
        }
    }

    fn pixel(x: u32, y: u32, color: &str, at: i64) -> PixelEvent {
        PixelEvent {
            canvas_id: CanvasId::new("main".to_string()).unwrap(),
            x,
            y,
            color: HexColor::try_from(color).unwrap(),
            timestamp: Timestamp::new(at),
            author: Some(Author {
                user_id: UserId::new("alice".to_string()).unwrap(),
                username: "alice".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_get_config_for_known_and_unknown_canvas() {
        // テスト項目: 登録済みキャンバスの設定が取得でき、未登録は None
        // given (前提条件):
        let store = InMemoryPixelStore::with_canvases([config("main")]);

        // when (操作):
        let known = store.get_config(&config("main").canvas_id).await.unwrap();
        let unknown = store.get_config(&config("other").canvas_id).await.unwrap();

        // then (期待する結果):
        assert_eq!(known, Some(config("main")));
        assert_eq!(unknown, None);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_cell() {
        // テスト項目: 同じセルへの upsert は後勝ちで上書きされる
        // given (前提条件):
        let store = InMemoryPixelStore::with_canvases([config("main")]);

        // when (操作):
        store.upsert_pixel(&pixel(3, 4, "#FF0000", 0)).await.unwrap();
        store.upsert_pixel(&pixel(3, 4, "#00FF00", 10)).await.unwrap();
        store.upsert_pixel(&pixel(0, 0, "#000000", 5)).await.unwrap();
        let pixels = store
            .get_all_pixels(&config("main").canvas_id)
            .await
            .unwrap();

        // then (期待する結果): セルごとに 1 件、(y, x) 順
        assert_eq!(pixels.len(), 2);
        assert_eq!(pixels[0].color.as_str(), "#000000");
        assert_eq!(pixels[1].color.as_str(), "#00FF00");
        assert_eq!(pixels[1].timestamp, Timestamp::new(10));
    }

    #[tokio::test]
    async fn test_upsert_unknown_canvas_fails() {
        // テスト項目: 未登録キャンバスへの upsert はエラーになる
        let store = InMemoryPixelStore::new();
        let result = store.upsert_pixel(&pixel(0, 0, "#FFFFFF", 0)).await;
        assert_eq!(result, Err(StoreError::CanvasNotFound("main".to_string())));
    }

    #[tokio::test]
    async fn test_put_config_keeps_existing_cells() {
        // テスト項目: 設定の置き換えでセルは失われない
        // given (前提条件):
        let store = InMemoryPixelStore::with_canvases([config("main")]);
        store.upsert_pixel(&pixel(1, 1, "#FFFFFF", 0)).await.unwrap();

        // when (操作):
        let mut updated = config("main");
        updated.cooldown_seconds = 0;
        store.put_config(updated.clone()).await;

        // then (期待する結果):
        let id = config("main").canvas_id;
        assert_eq!(store.get_config(&id).await.unwrap(), Some(updated));
        assert_eq!(store.get_all_pixels(&id).await.unwrap().len(), 1);
    }
}
