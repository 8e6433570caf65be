//! Connection registry interface.
//!
//! The registry is the only owner of [`Connection`] records and room
//! membership. Heartbeat sweeps and fan-out go through this trait and never
//! touch transport objects directly.

use super::{
    entity::{Connection, Outbound},
    value_object::{CanvasId, ConnectionId, Timestamp, UserId},
};

/// Result of a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Viewer count of the joined room after the join
    pub viewer_count: usize,
    /// `false` when the connection was already in this room
    pub newly_joined: bool,
    /// Set when the connection moved here from another room
    pub previous_room: Option<Departure>,
}

/// A connection left a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub connection_id: ConnectionId,
    pub canvas_id: CanvasId,
    pub user_id: UserId,
    /// Viewer count left behind; `0` means the room was dropped
    pub remaining: usize,
}

/// Per-broadcast delivery summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    /// Peers whose outbound queue is gone
    pub failed: Vec<ConnectionId>,
}

/// Per-sweep liveness summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub pinged: usize,
    /// Peers that were told to close and must now leave their rooms
    pub expired: Vec<ConnectionId>,
}

/// Room membership and per-connection delivery.
///
/// Implementations serialize mutations per room; there is no global lock.
pub trait ConnectionRegistry: Send + Sync {
    /// Add a connection to the room named by `connection.canvas_id`,
    /// creating the room if needed. Joining the same room again is a no-op;
    /// joining a different room moves the connection.
    fn join(&self, connection: Connection) -> JoinOutcome;

    /// Remove a connection. Empty rooms are dropped. Returns `None` if the
    /// connection was not registered.
    fn leave(&self, connection_id: &ConnectionId) -> Option<Departure>;

    /// Current viewer count of a room (`0` if it does not exist).
    fn viewer_count(&self, canvas_id: &CanvasId) -> usize;

    /// Number of live rooms.
    fn room_count(&self) -> usize;

    /// Room the connection currently belongs to.
    fn canvas_of(&self, connection_id: &ConnectionId) -> Option<CanvasId>;

    /// Queue a frame for one connection. Returns `false` if the connection is
    /// unknown or its queue is closed.
    fn push_to(&self, connection_id: &ConnectionId, frame: Outbound) -> bool;

    /// Queue a frame for every member of a room except `exclude`.
    ///
    /// `render` receives the viewer count observed under the room lock and
    /// returns the payload, or `None` to send nothing. Calls for the same room
    /// are serialized, so every member sees broadcasts in the order they were
    /// enqueued.
    fn fan_out_with(
        &self,
        canvas_id: &CanvasId,
        exclude: Option<&ConnectionId>,
        render: &dyn Fn(usize) -> Option<String>,
    ) -> FanOutReport;

    /// Queue a prepared `payload` for every member of a room except `exclude`.
    fn fan_out(
        &self,
        canvas_id: &CanvasId,
        payload: &str,
        exclude: Option<&ConnectionId>,
    ) -> FanOutReport {
        self.fan_out_with(canvas_id, exclude, &|_| Some(payload.to_string()))
    }

    /// Record a liveness signal (pong or any other message).
    fn mark_alive(&self, connection_id: &ConnectionId, now: Timestamp);

    /// Liveness pass over every room: expired peers get a close frame,
    /// everyone else gets `ping_payload` and is marked as awaiting a pong.
    fn sweep(&self, now: Timestamp, timeout_ms: i64, ping_payload: &str) -> SweepOutcome;
}
