//! UseCase: ハートビート監視
//!
//! 一定間隔で Registry 全体を走査し、応答のない接続を切断します。
//!
//! - ping を送ってから `interval + grace` 以上応答がない接続はタイムアウト
//!   （close frame を送り、退出処理を通す）
//! - それ以外の接続には ping を送り、応答待ちにする
//! - pong に限らず、何かを受信すれば応答待ちは解除される（`mark_alive`）
//!
//! 走査は Registry のルーム単位のロックの中で行われるため、
//! 同時に起きる参加・退出と競合しません。

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};

use pixelwall_shared::time::Clock;

use crate::{
    domain::{ConnectionId, ConnectionRegistry, SweepOutcome, Timestamp},
    infrastructure::dto::websocket::{Heartbeat, ServerMessage},
};

use super::leave_canvas::LeaveCanvasUseCase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub grace: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            grace: Duration::from_secs(10),
        }
    }
}

impl HeartbeatConfig {
    /// Silence allowed after a ping before the connection is reclaimed.
    pub fn timeout(&self) -> Duration {
        self.interval + self.grace
    }
}

/// ハートビート監視
pub struct HeartbeatMonitor {
    registry: Arc<dyn ConnectionRegistry>,
    leave: Arc<LeaveCanvasUseCase>,
    clock: Arc<dyn Clock>,
    config: HeartbeatConfig,
}

/// 実行中の監視タスク
pub struct HeartbeatHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// 監視タスクを停止し、終了を待つ
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("Heartbeat task ended abnormally: {}", e);
        }
    }
}

impl HeartbeatMonitor {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        leave: Arc<LeaveCanvasUseCase>,
        clock: Arc<dyn Clock>,
        config: HeartbeatConfig,
    ) -> Self {
        Self {
            registry,
            leave,
            clock,
            config,
        }
    }

    pub fn config(&self) -> HeartbeatConfig {
        self.config
    }

    /// 接続から何かを受信したことを記録する
    pub fn record_activity(&self, connection_id: &ConnectionId) {
        self.registry
            .mark_alive(connection_id, Timestamp::new(self.clock.now_millis()));
    }

    /// 1 回分の走査
    pub fn sweep_once(&self) -> SweepOutcome {
        let now = self.clock.now_millis();
        let ping = match ServerMessage::Ping(Heartbeat {}).encode(now) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to encode heartbeat ping: {}", e);
                return SweepOutcome::default();
            }
        };
        let timeout_ms = i64::try_from(self.config.timeout().as_millis()).unwrap_or(i64::MAX);

        let outcome = self
            .registry
            .sweep(Timestamp::new(now), timeout_ms, &ping);
        for connection_id in &outcome.expired {
            tracing::info!("Connection {} timed out", connection_id);
            self.leave.execute(connection_id);
        }
        tracing::debug!(
            "Heartbeat sweep: {} pinged, {} expired",
            outcome.pinged,
            outcome.expired.len()
        );
        outcome
    }

    /// 監視タスクを起動する
    pub fn start(self: Arc<Self>) -> HeartbeatHandle {
        tracing::info!(
            "Heartbeat monitor started (interval {:?}, grace {:?})",
            self.config.interval,
            self.config.grace
        );
        let (shutdown, mut stop) = watch::channel(false);
        let period = self.config.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // 最初の tick は即時に完了する
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                    _ = stop.changed() => break,
                }
            }
            tracing::info!("Heartbeat monitor stopped");
        });
        HeartbeatHandle { shutdown, task }
    }
}
