//! Domain entities.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{
    error::ValueObjectError,
    value_object::{CanvasId, ConnectionId, HexColor, Timestamp, UserId},
};

/// Frame queued for delivery to a single socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized envelope, shared between every recipient of a broadcast
    Text(Arc<str>),
    /// Close the socket with the given close code
    Close { code: u16, reason: String },
}

/// Outbound queue of one socket. The socket task owns the receiving half.
pub type PusherChannel = mpsc::UnboundedSender<Outbound>;

/// A live socket that has joined a room.
///
/// Owned by the connection registry; other components only see it through
/// the registry interface.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub canvas_id: CanvasId,
    pub user_id: UserId,
    pub sender: PusherChannel,
    pub last_seen: Timestamp,
    /// A ping went out and nothing has come back since
    pub awaiting_pong: bool,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        canvas_id: CanvasId,
        user_id: UserId,
        sender: PusherChannel,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            canvas_id,
            user_id,
            sender,
            last_seen: now,
            awaiting_pong: false,
        }
    }

    /// Record a liveness signal from the peer.
    pub fn touch(&mut self, now: Timestamp) {
        self.last_seen = now;
        self.awaiting_pong = false;
    }

    /// Whether the peer has been silent for at least `timeout_ms` with a ping outstanding.
    pub fn is_expired(&self, now: Timestamp, timeout_ms: i64) -> bool {
        self.awaiting_pong && now.millis_since(self.last_seen) >= timeout_ms
    }

    pub fn push(&self, frame: Outbound) -> bool {
        self.sender.send(frame).is_ok()
    }
}

/// Live connection set of one canvas.
#[derive(Debug, Clone)]
pub struct Room {
    pub canvas_id: CanvasId,
    connections: HashMap<ConnectionId, Connection>,
}

impl Room {
    pub fn new(canvas_id: CanvasId) -> Self {
        Self {
            canvas_id,
            connections: HashMap::new(),
        }
    }

    /// Add a connection. Returns `false` if it was already a member.
    pub fn add(&mut self, connection: Connection) -> bool {
        if self.connections.contains_key(&connection.id) {
            return false;
        }
        self.connections.insert(connection.id, connection);
        true
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<Connection> {
        self.connections.remove(id)
    }

    pub fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn connections_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.connections.values_mut()
    }

    /// Current viewer count.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Who may place pixels on a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Identity optional
    #[default]
    Anyone,
    /// Registered users and guests
    UserOrGuest,
    /// Registered users only
    UserOnly,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Anyone => "anyone",
            AuthMode::UserOrGuest => "user_or_guest",
            AuthMode::UserOnly => "user_only",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = ValueObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anyone" => Ok(AuthMode::Anyone),
            "user_or_guest" => Ok(AuthMode::UserOrGuest),
            "user_only" => Ok(AuthMode::UserOnly),
            other => Err(ValueObjectError::InvalidFormat {
                field: "auth_mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Per-canvas configuration, read from the canvas-config store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasConfig {
    pub canvas_id: CanvasId,
    pub width: u32,
    pub height: u32,
    pub cooldown_seconds: u64,
    /// `None` means every well-formed color is allowed
    pub allowed_colors: Option<Vec<HexColor>>,
    pub auth_mode: AuthMode,
}

impl CanvasConfig {
    pub fn contains(&self, x: i64, y: i64) -> bool {
        (0..i64::from(self.width)).contains(&x) && (0..i64::from(self.height)).contains(&y)
    }

    pub fn allows_color(&self, color: &HexColor) -> bool {
        match &self.allowed_colors {
            Some(palette) => palette.contains(color),
            None => true,
        }
    }
}

/// Resolved caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub is_guest: bool,
}

/// Identity fields as they arrive with a request, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityClaims {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub is_guest: Option<bool>,
}

/// Author attached to a placed pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub user_id: UserId,
    pub username: String,
}

impl From<&Identity> for Author {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
        }
    }
}

/// Most recent accepted write to one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelEvent {
    pub canvas_id: CanvasId,
    pub x: u32,
    pub y: u32,
    pub color: HexColor,
    pub timestamp: Timestamp,
    pub author: Option<Author>,
}
