//! UseCase: ルーム退出処理
//!
//! 通常の切断・ハートビートのタイムアウト・送信失敗による除去は、
//! すべてこのユースケースを経由します。
//!
//! ## 処理の流れ
//!
//! 1. Registry から接続を取り除く（空になったルームは Registry が削除）
//! 2. ルームに残りがいれば視聴者数を通知する
//! 3. 通知の送信に失敗した相手も同じ手順で取り除く

use std::sync::Arc;

use pixelwall_shared::time::Clock;

use crate::domain::{ConnectionId, ConnectionRegistry, Departure};

use super::broadcast::viewer_count_payload;

/// ルーム退出のユースケース
pub struct LeaveCanvasUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    clock: Arc<dyn Clock>,
}

impl LeaveCanvasUseCase {
    /// 新しい LeaveCanvasUseCase を作成
    pub fn new(registry: Arc<dyn ConnectionRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    /// 接続をルームから退出させる
    ///
    /// # Returns
    ///
    /// * `Some(Departure)` - 指定した接続の退出結果
    /// * `None` - 既に退出済み（冪等）
    pub fn execute(&self, connection_id: &ConnectionId) -> Option<Departure> {
        let mut pending = vec![*connection_id];
        let mut first = None;

        while let Some(id) = pending.pop() {
            let Some(departure) = self.registry.leave(&id) else {
                continue;
            };
            tracing::info!(
                "Connection {} ({}) left canvas '{}', {} viewers remain",
                departure.connection_id,
                departure.user_id,
                departure.canvas_id,
                departure.remaining
            );

            if departure.remaining > 0 {
                let timestamp = self.clock.now_millis();
                let canvas_id = departure.canvas_id.clone();
                let report = self.registry.fan_out_with(&canvas_id, None, &|count| {
                    viewer_count_payload(&canvas_id, count, timestamp)
                });
                for dead in report.failed {
                    tracing::warn!("Dropping unreachable connection {}", dead);
                    pending.push(dead);
                }
            }

            if first.is_none() {
                first = Some(departure);
            }
        }

        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{CanvasId, Connection, Outbound, Timestamp, UserId},
        infrastructure::registry::InMemoryConnectionRegistry,
    };
    use pixelwall_shared::time::FixedClock;
    use tokio::sync::mpsc;

    fn setup() -> (Arc<InMemoryConnectionRegistry>, LeaveCanvasUseCase) {
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let usecase = LeaveCanvasUseCase::new(registry.clone(), Arc::new(FixedClock::new(1_000)));
        (registry, usecase)
    }

    fn join(
        registry: &InMemoryConnectionRegistry,
        user: &str,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection::new(
            ConnectionId::generate(),
            CanvasId::new("main".to_string()).unwrap(),
            UserId::new(user.to_string()).unwrap(),
            tx,
            Timestamp::new(0),
        );
        let id = conn.id;
        registry.join(conn);
        (id, rx)
    }

    fn next_text(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> serde_json::Value {
        match rx.try_recv().expect("frame") {
            Outbound::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_leave_broadcasts_remaining_count() {
        // テスト項目: 退出すると残りの参加者に視聴者数が通知される
        // given (前提条件):
        let (registry, usecase) = setup();
        let (alice, _alice_rx) = join(&registry, "alice");
        let (_bob, mut bob_rx) = join(&registry, "bob");

        // when (操作):
        let departure = usecase.execute(&alice).expect("departure");

        // then (期待する結果):
        assert_eq!(departure.remaining, 1);
        let update = next_text(&mut bob_rx);
        assert_eq!(update["type"], "user_count_update");
        assert_eq!(update["data"]["connectedUsers"], 1);
    }

    #[test]
    fn test_leave_last_member_drops_room_without_broadcast() {
        // テスト項目: 最後の参加者が退出するとルームが消え、通知は送られない
        let (registry, usecase) = setup();
        let (alice, _rx) = join(&registry, "alice");

        let departure = usecase.execute(&alice).expect("departure");

        assert_eq!(departure.remaining, 0);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn test_leave_is_idempotent() {
        // テスト項目: 2 回目の退出は None（冪等）
        let (registry, usecase) = setup();
        let (alice, _rx) = join(&registry, "alice");

        assert!(usecase.execute(&alice).is_some());
        assert!(usecase.execute(&alice).is_none());
    }

    #[test]
    fn test_leave_also_evicts_unreachable_peers() {
        // テスト項目: 視聴者数通知に失敗した相手も退出扱いになる
        // given (前提条件):
        let (registry, usecase) = setup();
        let (alice, _alice_rx) = join(&registry, "alice");
        let (_bob, bob_rx) = join(&registry, "bob");
        let (_carol, mut carol_rx) = join(&registry, "carol");
        drop(bob_rx);

        // when (操作):
        usecase.execute(&alice);

        // then (期待する結果): bob も除去され、carol には最終的に 1 人と通知される
        assert_eq!(registry.viewer_count(&CanvasId::new("main".to_string()).unwrap()), 1);
        let mut last = None;
        while let Ok(Outbound::Text(text)) = carol_rx.try_recv() {
            last = Some(serde_json::from_str::<serde_json::Value>(&text).unwrap());
        }
        assert_eq!(last.unwrap()["data"]["connectedUsers"], 1);
    }
}
