//! UseCase: ブロードキャスト（ファンアウト）
//!
//! メッセージを 1 回だけシリアライズし、ルームの全員（任意で 1 人を除く）に送信します。
//! 送信に失敗した相手は切断済みとみなし、退出処理と同じ経路で取り除きます。
//! 失敗は相手ごとに閉じており、呼び出し元や他の相手には影響しません。

use std::sync::Arc;

use pixelwall_shared::time::Clock;

use crate::{
    domain::{CanvasId, ConnectionId, ConnectionRegistry, Outbound},
    infrastructure::dto::websocket::{ServerMessage, UserCountData},
};

use super::leave_canvas::LeaveCanvasUseCase;

/// `user_count_update` envelope for `count` viewers.
pub(crate) fn viewer_count_payload(
    canvas_id: &CanvasId,
    count: usize,
    timestamp: i64,
) -> Option<String> {
    let message = ServerMessage::UserCountUpdate(UserCountData {
        canvas_id: canvas_id.as_str().to_string(),
        connected_users: count,
    });
    match message.encode(timestamp) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to encode user count update: {}", e);
            None
        }
    }
}

/// ブロードキャストのユースケース
pub struct BroadcastUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    leave: Arc<LeaveCanvasUseCase>,
    clock: Arc<dyn Clock>,
}

impl BroadcastUseCase {
    /// 新しい BroadcastUseCase を作成
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        leave: Arc<LeaveCanvasUseCase>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            leave,
            clock,
        }
    }

    /// ルームへブロードキャストする
    ///
    /// # Returns
    ///
    /// 送信キューに積めた相手の数
    pub fn broadcast(
        &self,
        canvas_id: &CanvasId,
        message: &ServerMessage,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        let payload = match message.encode(self.clock.now_millis()) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to encode broadcast for '{}': {}", canvas_id, e);
                return 0;
            }
        };

        let report = self.registry.fan_out(canvas_id, &payload, exclude);
        tracing::debug!(
            "Broadcast to canvas '{}': {} delivered, {} failed",
            canvas_id,
            report.delivered,
            report.failed.len()
        );
        self.evict(report.failed);
        report.delivered
    }

    /// ルームの現在の視聴者数をルーム全員に通知する
    pub fn broadcast_viewer_count(&self, canvas_id: &CanvasId) -> usize {
        let timestamp = self.clock.now_millis();
        let report = self.registry.fan_out_with(canvas_id, None, &|count| {
            viewer_count_payload(canvas_id, count, timestamp)
        });
        self.evict(report.failed);
        report.delivered
    }

    /// 1 つの接続にだけ送信する
    pub fn send_to(&self, connection_id: &ConnectionId, message: &ServerMessage) -> bool {
        let payload = match message.encode(self.clock.now_millis()) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to encode message for {}: {}", connection_id, e);
                return false;
            }
        };

        let delivered = self
            .registry
            .push_to(connection_id, Outbound::Text(Arc::from(payload)));
        if !delivered {
            self.evict(vec![*connection_id]);
        }
        delivered
    }

    fn evict(&self, failed: Vec<ConnectionId>) {
        for connection_id in failed {
            tracing::warn!(
                "Delivery to connection {} failed, removing it",
                connection_id
            );
            self.leave.execute(&connection_id);
        }
    }
}
