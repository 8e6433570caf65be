//! UseCase: ピクセル配置処理
//!
//! ## 処理の流れ
//!
//! 1. キャンバス設定を取得する（なければ `CanvasNotFound`）
//! 2. 座標 → 色 → パレット → 認証 の順に検証し、最初の違反で止める
//! 3. クールダウンを確認する（拒否された試行はクールダウンを延長しない）
//! 4. ストアに書き込み、ルーム全員に `pixel_placed` をブロードキャストする
//!
//! 4 はキャンバスごとの commit lane の中で行うため、
//! 同じキャンバスへの書き込みはストアへの反映順にブロードキャストされます。
//! 同じセルへの同時書き込みでも、最後に届いたイベントがストアの値と一致します。

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use pixelwall_shared::time::Clock;

use crate::{
    domain::{
        Author, CanvasId, CooldownGate, IdentityClaims, IdentityResolver, PixelEvent, PixelStore,
        Timestamp, UserId,
        placement::{check_auth, check_palette, validate_color, validate_coordinates},
    },
    infrastructure::dto::websocket::{PixelPlacedData, ServerMessage},
};

use super::{broadcast::BroadcastUseCase, error::PlaceError};

/// 配置リクエスト
///
/// `x` / `y` / `color` は受け取ったままの値で、`None` は欠落または型違い。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacePixelCommand {
    pub canvas_id: String,
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub color: Option<String>,
    pub claims: IdentityClaims,
}

/// ピクセル配置のユースケース
pub struct PlacePixelUseCase {
    store: Arc<dyn PixelStore>,
    cooldown: Arc<dyn CooldownGate>,
    identity: Arc<dyn IdentityResolver>,
    broadcast: Arc<BroadcastUseCase>,
    clock: Arc<dyn Clock>,
    /// Serializes commit + broadcast per canvas
    lanes: DashMap<CanvasId, Arc<Mutex<()>>>,
}

impl PlacePixelUseCase {
    pub fn new(
        store: Arc<dyn PixelStore>,
        cooldown: Arc<dyn CooldownGate>,
        identity: Arc<dyn IdentityResolver>,
        broadcast: Arc<BroadcastUseCase>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cooldown,
            identity,
            broadcast,
            clock,
            lanes: DashMap::new(),
        }
    }

    /// ピクセル配置を実行
    ///
    /// # Returns
    ///
    /// * `Ok(PixelEvent)` - 書き込まれ、ブロードキャストされたイベント
    /// * `Err(PlaceError)` - 拒否理由。拒否された配置は書き込まれず、ブロードキャストもされない
    pub async fn execute(&self, command: PlacePixelCommand) -> Result<PixelEvent, PlaceError> {
        let canvas_id = CanvasId::new(command.canvas_id.clone())
            .map_err(|_| PlaceError::CanvasNotFound(command.canvas_id.clone()))?;
        let config = self
            .store
            .get_config(&canvas_id)
            .await?
            .ok_or_else(|| PlaceError::CanvasNotFound(canvas_id.as_str().to_string()))?;

        let (x, y) = validate_coordinates(&config, command.x, command.y)?;
        let color = validate_color(command.color.as_deref())?;
        check_palette(&config, &color)?;

        let identity = self.identity.resolve(&command.claims).await;
        check_auth(config.auth_mode, identity.as_ref())?;

        let user_id = identity
            .as_ref()
            .map(|identity| identity.user_id.clone())
            .unwrap_or_else(UserId::anonymous);
        let now = Timestamp::new(self.clock.now_millis());
        if !self
            .cooldown
            .allow(&canvas_id, &user_id, config.cooldown_seconds, now)
        {
            let retry_after_ms = self
                .cooldown
                .remaining_ms(&canvas_id, &user_id, config.cooldown_seconds, now)
                .max(1);
            tracing::debug!(
                "Rate limited '{}' on canvas '{}' for {} ms",
                user_id,
                canvas_id,
                retry_after_ms
            );
            return Err(PlaceError::RateLimited { retry_after_ms });
        }

        let pixel = PixelEvent {
            canvas_id: canvas_id.clone(),
            x,
            y,
            color,
            timestamp: now,
            author: identity.as_ref().map(Author::from),
        };

        let lane = self.lanes.entry(canvas_id.clone()).or_default().value().clone();
        let _commit = lane.lock().await;

        if let Err(e) = self.store.upsert_pixel(&pixel).await {
            tracing::error!(
                "Failed to store pixel ({}, {}) on canvas '{}': {}",
                x,
                y,
                canvas_id,
                e
            );
            return Err(e.into());
        }

        let delivered = self.broadcast.broadcast(
            &canvas_id,
            &ServerMessage::PixelPlaced(PixelPlacedData::from(&pixel)),
            None,
        );
        tracing::info!(
            "Pixel ({}, {}) = {} placed on '{}' by '{}', broadcast to {} viewers",
            x,
            y,
            pixel.color,
            canvas_id,
            user_id,
            delivered
        );

        Ok(pixel)
    }
}
