//! UseCase: ルーム参加処理
//!
//! ## 処理の流れ
//!
//! 1. キャンバス ID を検証する（なければ `InvalidRoom`）
//! 2. Registry に接続を登録する（別ルームにいた場合は移動）
//! 3. 移動元のルームに残りがいれば視聴者数を通知する
//! 4. 参加者本人に `connected` を送る
//! 5. 新規参加であればルーム全員に視聴者数を通知する

use std::sync::Arc;

use pixelwall_shared::time::Clock;

use crate::{
    domain::{
        CanvasId, Connection, ConnectionId, ConnectionRegistry, PusherChannel, Timestamp, UserId,
    },
    infrastructure::dto::websocket::{ConnectedData, ServerMessage},
};

use super::{broadcast::BroadcastUseCase, error::JoinError};

/// 参加リクエスト
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub connection_id: ConnectionId,
    pub canvas_id: Option<String>,
    pub user_id: Option<String>,
    pub sender: PusherChannel,
}

/// 参加結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinReceipt {
    pub canvas_id: CanvasId,
    pub user_id: UserId,
    pub connected_users: usize,
}

/// ルーム参加のユースケース
pub struct JoinCanvasUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    broadcast: Arc<BroadcastUseCase>,
    clock: Arc<dyn Clock>,
}

impl JoinCanvasUseCase {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        broadcast: Arc<BroadcastUseCase>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            broadcast,
            clock,
        }
    }

    /// 接続をルームに参加させる
    ///
    /// 同じルームへの再参加は冪等で、視聴者数は変わりません。
    pub fn execute(&self, request: JoinRequest) -> Result<JoinReceipt, JoinError> {
        let canvas_id = request
            .canvas_id
            .and_then(|raw| CanvasId::new(raw).ok())
            .ok_or(JoinError::InvalidRoom)?;
        // 不正な userId は匿名扱い
        let user_id = request
            .user_id
            .and_then(|raw| UserId::new(raw).ok())
            .unwrap_or_else(UserId::anonymous);

        let now = Timestamp::new(self.clock.now_millis());
        let connection = Connection::new(
            request.connection_id,
            canvas_id.clone(),
            user_id.clone(),
            request.sender,
            now,
        );
        let outcome = self.registry.join(connection);

        if let Some(previous) = &outcome.previous_room {
            tracing::info!(
                "Connection {} moved from '{}' to '{}'",
                request.connection_id,
                previous.canvas_id,
                canvas_id
            );
            if previous.remaining > 0 {
                self.broadcast.broadcast_viewer_count(&previous.canvas_id);
            }
        }

        self.broadcast.send_to(
            &request.connection_id,
            &ServerMessage::Connected(ConnectedData {
                canvas_id: canvas_id.as_str().to_string(),
                user_id: user_id.as_str().to_string(),
                connected_users: outcome.viewer_count,
            }),
        );

        if outcome.newly_joined {
            tracing::info!(
                "Connection {} ({}) joined canvas '{}' ({} viewers)",
                request.connection_id,
                user_id,
                canvas_id,
                outcome.viewer_count
            );
            self.broadcast.broadcast_viewer_count(&canvas_id);
        }

        Ok(JoinReceipt {
            canvas_id,
            user_id,
            connected_users: outcome.viewer_count,
        })
    }
}
