//! InMemory ConnectionRegistry 実装
//!
//! ドメイン層が定義する `ConnectionRegistry` trait の具体的な実装。
//! `DashMap` をルーム表として使用します。
//!
//! ## ロックの粒度
//!
//! - `rooms`: canvas_id -> Room。ルーム単位の変更はシャードロックで直列化される
//! - `index`: connection_id -> canvas_id。leave 時に所属ルームを引くための逆引き
//!
//! ロック順序は常に `rooms` -> `index`。`index` のガードを保持したまま
//! `rooms` をロックしないこと。

use std::sync::Arc;

use dashmap::DashMap;

use crate::domain::{
    CanvasId, Connection, ConnectionId, ConnectionRegistry, Departure, FanOutReport, JoinOutcome,
    Outbound, Room, SweepOutcome, Timestamp,
};

/// Close code sent to peers that missed their heartbeat (1001 going away)
pub const HEARTBEAT_TIMEOUT_CLOSE_CODE: u16 = 1001;

/// インメモリ ConnectionRegistry 実装
#[derive(Default)]
pub struct InMemoryConnectionRegistry {
    rooms: DashMap<CanvasId, Room>,
    index: DashMap<ConnectionId, CanvasId>,
}

impl InMemoryConnectionRegistry {
    /// 新しい InMemoryConnectionRegistry を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 接続をルームから取り除き、空になったルームを削除する
    fn detach(&self, canvas_id: &CanvasId, connection_id: &ConnectionId) -> Option<Departure> {
        let (removed, remaining) = {
            let mut room = self.rooms.get_mut(canvas_id)?;
            let removed = room.remove(connection_id)?;
            (removed, room.len())
        };

        if remaining == 0 {
            // 別スレッドが直前に join していれば削除しない
            self.rooms.remove_if(canvas_id, |_, room| room.is_empty());
        }

        Some(Departure {
            connection_id: *connection_id,
            canvas_id: canvas_id.clone(),
            user_id: removed.user_id,
            remaining,
        })
    }
}

impl ConnectionRegistry for InMemoryConnectionRegistry {
    fn join(&self, connection: Connection) -> JoinOutcome {
        let connection_id = connection.id;
        let target = connection.canvas_id.clone();

        let current = self.index.get(&connection_id).map(|entry| entry.value().clone());
        let previous_room = match current {
            Some(canvas_id) if canvas_id == target => {
                return JoinOutcome {
                    viewer_count: self.viewer_count(&target),
                    newly_joined: false,
                    previous_room: None,
                };
            }
            Some(canvas_id) => self.detach(&canvas_id, &connection_id),
            None => None,
        };

        let mut room = self
            .rooms
            .entry(target.clone())
            .or_insert_with(|| Room::new(target.clone()));
        let newly_joined = room.add(connection);
        let viewer_count = room.len();
        self.index.insert(connection_id, target.clone());
        drop(room);

        tracing::debug!(
            "Connection {} joined canvas '{}' ({} viewers)",
            connection_id,
            target,
            viewer_count
        );

        JoinOutcome {
            viewer_count,
            newly_joined,
            previous_room,
        }
    }

    fn leave(&self, connection_id: &ConnectionId) -> Option<Departure> {
        let (_, canvas_id) = self.index.remove(connection_id)?;
        let departure = self.detach(&canvas_id, connection_id)?;

        tracing::debug!(
            "Connection {} left canvas '{}' ({} viewers remain)",
            connection_id,
            canvas_id,
            departure.remaining
        );
        Some(departure)
    }

    fn viewer_count(&self, canvas_id: &CanvasId) -> usize {
        self.rooms.get(canvas_id).map(|room| room.len()).unwrap_or(0)
    }

    fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn canvas_of(&self, connection_id: &ConnectionId) -> Option<CanvasId> {
        self.index.get(connection_id).map(|entry| entry.value().clone())
    }

    fn push_to(&self, connection_id: &ConnectionId, frame: Outbound) -> bool {
        let Some(canvas_id) = self.canvas_of(connection_id) else {
            return false;
        };
        self.rooms
            .get(&canvas_id)
            .and_then(|room| room.get(connection_id).map(|conn| conn.push(frame)))
            .unwrap_or(false)
    }

    fn fan_out_with(
        &self,
        canvas_id: &CanvasId,
        exclude: Option<&ConnectionId>,
        render: &dyn Fn(usize) -> Option<String>,
    ) -> FanOutReport {
        // 排他ロックで同一ルームへの送信順序を揃える
        let Some(room) = self.rooms.get_mut(canvas_id) else {
            return FanOutReport::default();
        };
        let Some(payload) = render(room.len()) else {
            return FanOutReport::default();
        };

        let payload: Arc<str> = Arc::from(payload);
        let mut report = FanOutReport::default();
        for conn in room.connections() {
            if Some(&conn.id) == exclude {
                continue;
            }
            if conn.push(Outbound::Text(Arc::clone(&payload))) {
                report.delivered += 1;
            } else {
                report.failed.push(conn.id);
            }
        }
        report
    }

    fn mark_alive(&self, connection_id: &ConnectionId, now: Timestamp) {
        let Some(canvas_id) = self.canvas_of(connection_id) else {
            return;
        };
        if let Some(mut room) = self.rooms.get_mut(&canvas_id)
            && let Some(conn) = room.get_mut(connection_id)
        {
            conn.touch(now);
        }
    }

    fn sweep(&self, now: Timestamp, timeout_ms: i64, ping_payload: &str) -> SweepOutcome {
        let ping: Arc<str> = Arc::from(ping_payload);
        let mut outcome = SweepOutcome::default();

        for mut room in self.rooms.iter_mut() {
            for conn in room.connections_mut() {
                if conn.is_expired(now, timeout_ms) {
                    conn.push(Outbound::Close {
                        code: HEARTBEAT_TIMEOUT_CLOSE_CODE,
                        reason: "heartbeat timeout".to_string(),
                    });
                    outcome.expired.push(conn.id);
                } else if conn.push(Outbound::Text(Arc::clone(&ping))) {
                    conn.awaiting_pong = true;
                    outcome.pinged += 1;
                } else {
                    outcome.expired.push(conn.id);
                }
            }
        }
        outcome
    }
}
