//! Client connection state machine.
//!
//! Pure and synchronous: every input returns the [`Effect`] the driver has
//! to carry out (open a socket, send `join_canvas`, arm or cancel the retry
//! timer). Timers and sockets live in the runner.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──opened──▶ Connected
//!      ▲                       │    ▲                 │
//!      │                 failed│    │timer     dropped│
//!      │                       ▼    │                 │
//!      └──exhausted/manual── Reconnecting ◀───────────┘
//! ```

use std::time::Duration;

/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Policy violation, sent by the server for an unusable canvas id
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Why a socket ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Clean close (1000)
    Normal,
    /// Server refused the join (1008); retrying cannot help
    Rejected,
    /// Error, missing close frame, or any other close code
    Abnormal,
    /// Nothing arrived from the server within the liveness window
    LivenessTimeout,
}

impl CloseKind {
    /// Classify a received close code. `None` means the socket ended without one.
    pub fn from_code(code: Option<u16>) -> Self {
        match code {
            Some(CLOSE_NORMAL) => CloseKind::Normal,
            Some(CLOSE_POLICY_VIOLATION) => CloseKind::Rejected,
            _ => CloseKind::Abnormal,
        }
    }

    pub fn should_reconnect(&self) -> bool {
        matches!(self, CloseKind::Abnormal | CloseKind::LivenessTimeout)
    }
}

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Work the driver has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Open a new socket
    Open,
    /// Send `join_canvas` on the fresh socket
    SendJoin,
    /// Arm the retry timer
    ScheduleRetry { attempt: u32, delay: Duration },
    /// Close the socket and drop any pending retry timer
    Stop,
    /// Retries exhausted; surface a terminal disconnected state
    GiveUp { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl ConnectionStateMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Retries scheduled since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// User-initiated connect. Only meaningful from `Disconnected`.
    pub fn connect(&mut self) -> Effect {
        match self.state {
            ConnectionState::Disconnected => {
                self.attempts = 0;
                self.state = ConnectionState::Connecting;
                Effect::Open
            }
            _ => Effect::None,
        }
    }

    /// The socket handshake finished.
    pub fn on_open(&mut self) -> Effect {
        match self.state {
            ConnectionState::Connecting => {
                self.attempts = 0;
                self.state = ConnectionState::Connected;
                Effect::SendJoin
            }
            _ => Effect::None,
        }
    }

    /// The socket ended, or the attempt to open it failed.
    pub fn on_close(&mut self, kind: CloseKind) -> Effect {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                if kind.should_reconnect() {
                    self.schedule_retry()
                } else {
                    self.state = ConnectionState::Disconnected;
                    Effect::None
                }
            }
            _ => Effect::None,
        }
    }

    /// The retry timer fired. Stale timers are ignored.
    pub fn on_retry_timer(&mut self) -> Effect {
        match self.state {
            ConnectionState::Reconnecting => {
                self.state = ConnectionState::Connecting;
                Effect::Open
            }
            _ => Effect::None,
        }
    }

    /// Manual disconnect: suppresses any further reconnection.
    pub fn disconnect(&mut self) -> Effect {
        match self.state {
            ConnectionState::Disconnected => Effect::None,
            _ => {
                self.state = ConnectionState::Disconnected;
                self.attempts = 0;
                Effect::Stop
            }
        }
    }

    fn schedule_retry(&mut self) -> Effect {
        if self.attempts >= self.policy.max_attempts {
            let attempts = self.attempts;
            self.state = ConnectionState::Disconnected;
            return Effect::GiveUp { attempts };
        }
        self.attempts += 1;
        self.state = ConnectionState::Reconnecting;
        Effect::ScheduleRetry {
            attempt: self.attempts,
            delay: self.policy.delay_for(self.attempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> ConnectionStateMachine {
        let mut machine = ConnectionStateMachine::new(ReconnectPolicy::default());
        machine.connect();
        machine.on_open();
        machine
    }

    #[test]
    fn test_connect_then_open_sends_join() {
        // テスト項目: 接続成功で Connected になり join_canvas を送る
        // given (前提条件):
        let mut machine = ConnectionStateMachine::new(ReconnectPolicy::default());

        // when (操作):
        let open = machine.connect();
        let join = machine.on_open();

        // then (期待する結果):
        assert_eq!(open, Effect::Open);
        assert_eq!(join, Effect::SendJoin);
        assert_eq!(machine.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        // テスト項目: 待ち時間は 1s から倍々に増え、30s で頭打ちになる
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=10).map(|n| policy.delay_for(n).as_secs()).collect();

        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30, 30, 30, 30]);
    }

    #[test]
    fn test_ten_failed_attempts_end_disconnected() {
        // テスト項目: 10 回連続で再接続に失敗すると Disconnected で停止する
        // given (前提条件):
        let mut machine = connected();
        let mut delays = Vec::new();

        // when (操作):
        let mut effect = machine.on_close(CloseKind::Abnormal);
        while let Effect::ScheduleRetry { delay, .. } = effect {
            delays.push(delay.as_secs());
            assert_eq!(machine.on_retry_timer(), Effect::Open);
            effect = machine.on_close(CloseKind::Abnormal);
        }

        // then (期待する結果):
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30, 30, 30, 30]);
        assert_eq!(effect, Effect::GiveUp { attempts: 10 });
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        // 終端状態ではタイマーが来ても再接続しない
        assert_eq!(machine.on_retry_timer(), Effect::None);
    }

    #[test]
    fn test_successful_reconnect_resets_attempts() {
        // テスト項目: 再接続に成功すると試行回数がリセットされる
        let mut machine = connected();
        machine.on_close(CloseKind::Abnormal);
        machine.on_retry_timer();
        machine.on_close(CloseKind::Abnormal);
        machine.on_retry_timer();
        assert_eq!(machine.attempts(), 2);

        machine.on_open();

        assert_eq!(machine.attempts(), 0);
        assert_eq!(
            machine.on_close(CloseKind::LivenessTimeout),
            Effect::ScheduleRetry {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
    }

    #[test]
    fn test_manual_disconnect_cancels_pending_retry() {
        // テスト項目: 手動切断で保留中の再接続が取り消され、以後再接続しない
        // given (前提条件):
        let mut machine = connected();
        machine.on_close(CloseKind::Abnormal);
        assert_eq!(machine.state(), ConnectionState::Reconnecting);

        // when (操作):
        let effect = machine.disconnect();

        // then (期待する結果):
        assert_eq!(effect, Effect::Stop);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert_eq!(machine.on_retry_timer(), Effect::None);
        assert_eq!(machine.on_close(CloseKind::Abnormal), Effect::None);
    }

    #[test]
    fn test_normal_and_rejected_closes_do_not_reconnect() {
        // テスト項目: 正常終了 (1000) と参加拒否 (1008) では再接続しない
        for code in [CLOSE_NORMAL, CLOSE_POLICY_VIOLATION] {
            let mut machine = connected();

            let effect = machine.on_close(CloseKind::from_code(Some(code)));

            assert_eq!(effect, Effect::None);
            assert_eq!(machine.state(), ConnectionState::Disconnected);
        }
    }

    #[test]
    fn test_close_classification() {
        // テスト項目: close コードの分類
        assert_eq!(CloseKind::from_code(Some(1000)), CloseKind::Normal);
        assert_eq!(CloseKind::from_code(Some(1008)), CloseKind::Rejected);
        assert_eq!(CloseKind::from_code(Some(1001)), CloseKind::Abnormal);
        assert_eq!(CloseKind::from_code(Some(1006)), CloseKind::Abnormal);
        assert_eq!(CloseKind::from_code(None), CloseKind::Abnormal);
    }

    #[test]
    fn test_failed_initial_connect_retries() {
        // テスト項目: 初回接続の失敗も再接続の対象になる
        let mut machine = ConnectionStateMachine::new(ReconnectPolicy::default());
        machine.connect();

        let effect = machine.on_close(CloseKind::Abnormal);

        assert!(matches!(effect, Effect::ScheduleRetry { attempt: 1, .. }));
        assert_eq!(machine.state(), ConnectionState::Reconnecting);
    }
}
