//! WebSocket wire envelope and message DTOs.
//!
//! Every frame is `{"type": string, "data": object, "timestamp"?: number}`.
//! Each side decodes into a closed enum of the message types it handles.
//! Types it does not handle decode to `None` and are ignored. Only a broken
//! envelope or a bad payload for a known type is a [`ProtocolError`].

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;

/// Wire names of every recognized message type
pub mod message_type {
    pub const JOIN_CANVAS: &str = "join_canvas";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const PIXEL_PLACED: &str = "pixel_placed";
    pub const USER_COUNT_UPDATE: &str = "user_count_update";
    pub const CONNECTED: &str = "connected";
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("invalid '{kind}' payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: Option<i64>,
}

/// A decoded frame together with its optional envelope timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub message: T,
    pub timestamp: Option<i64>,
}

fn decode_envelope<T: DeserializeOwned>(
    text: &str,
    handled: &[&str],
) -> Result<Option<Decoded<T>>, ProtocolError> {
    let raw: RawEnvelope = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
    if !handled.contains(&raw.kind.as_str()) {
        return Ok(None);
    }

    let data = match raw.data {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    let mut tagged = Map::new();
    tagged.insert("type".to_string(), Value::String(raw.kind.clone()));
    tagged.insert("data".to_string(), data);

    let message = serde_json::from_value(Value::Object(tagged)).map_err(|source| {
        ProtocolError::InvalidPayload {
            kind: raw.kind,
            source,
        }
    })?;
    Ok(Some(Decoded {
        message,
        timestamp: raw.timestamp,
    }))
}

fn encode_envelope<T: Serialize>(message: &T, timestamp: i64) -> Result<String, ProtocolError> {
    let mut value = serde_json::to_value(message).map_err(ProtocolError::Encode)?;
    if let Value::Object(map) = &mut value {
        map.entry("data")
            .or_insert_with(|| Value::Object(Map::new()));
        map.insert("timestamp".to_string(), Value::from(timestamp));
    }
    serde_json::to_string(&value).map_err(ProtocolError::Encode)
}

/// Empty payload of `ping` / `pong`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCanvasData {
    #[serde(default)]
    pub canvas_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedData {
    pub canvas_id: String,
    pub user_id: String,
    pub connected_users: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCountData {
    pub canvas_id: String,
    pub connected_users: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelPlacedData {
    pub canvas_id: String,
    pub x: u32,
    pub y: u32,
    pub color: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinCanvas(JoinCanvasData),
    Ping(Heartbeat),
    Pong(Heartbeat),
}

impl ClientMessage {
    const HANDLED: &'static [&'static str] = &[
        message_type::JOIN_CANVAS,
        message_type::PING,
        message_type::PONG,
    ];

    pub fn decode(text: &str) -> Result<Option<Decoded<Self>>, ProtocolError> {
        decode_envelope(text, Self::HANDLED)
    }

    pub fn encode(&self, timestamp: i64) -> Result<String, ProtocolError> {
        encode_envelope(self, timestamp)
    }
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected(ConnectedData),
    UserCountUpdate(UserCountData),
    PixelPlaced(PixelPlacedData),
    Ping(Heartbeat),
    Pong(Heartbeat),
}

impl ServerMessage {
    const HANDLED: &'static [&'static str] = &[
        message_type::CONNECTED,
        message_type::USER_COUNT_UPDATE,
        message_type::PIXEL_PLACED,
        message_type::PING,
        message_type::PONG,
    ];

    pub fn decode(text: &str) -> Result<Option<Decoded<Self>>, ProtocolError> {
        decode_envelope(text, Self::HANDLED)
    }

    pub fn encode(&self, timestamp: i64) -> Result<String, ProtocolError> {
        encode_envelope(self, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wraps_payload_in_envelope() {
        // テスト項目: サーバーメッセージが type / data / timestamp の封筒で送られる
        // given (前提条件):
        let message = ServerMessage::UserCountUpdate(UserCountData {
            canvas_id: "main".to_string(),
            connected_users: 3,
        });

        // when (操作):
        let json = message.encode(1_000).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        // then (期待する結果):
        assert_eq!(value["type"], "user_count_update");
        assert_eq!(value["data"]["canvasId"], "main");
        assert_eq!(value["data"]["connectedUsers"], 3);
        assert_eq!(value["timestamp"], 1_000);
    }

    #[test]
    fn test_ping_has_empty_object_payload() {
        // テスト項目: ping の data は空オブジェクト
        let json = ServerMessage::Ping(Heartbeat {}).encode(5).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "ping");
        assert_eq!(value["data"], serde_json::json!({}));
    }

    #[test]
    fn test_decode_join_canvas() {
        // テスト項目: join_canvas を解析できる
        // given (前提条件):
        let text = r#"{"type":"join_canvas","data":{"canvasId":"main","userId":"alice"}}"#;

        // when (操作):
        let decoded = ClientMessage::decode(text).unwrap().unwrap();

        // then (期待する結果):
        assert_eq!(
            decoded.message,
            ClientMessage::JoinCanvas(JoinCanvasData {
                canvas_id: Some("main".to_string()),
                user_id: Some("alice".to_string()),
            })
        );
        assert_eq!(decoded.timestamp, None);
    }

    #[test]
    fn test_decode_pong_without_data() {
        // テスト項目: data の無い pong も解析できる
        let decoded = ClientMessage::decode(r#"{"type":"pong","timestamp":7}"#)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.message, ClientMessage::Pong(Heartbeat {}));
        assert_eq!(decoded.timestamp, Some(7));
    }

    #[test]
    fn test_decode_unknown_type_is_ignored() {
        // テスト項目: 未知の type はエラーではなく無視 (None) される
        let unknown = ClientMessage::decode(r#"{"type":"cursor_moved","data":{"x":1}}"#).unwrap();
        let server_only = ClientMessage::decode(r#"{"type":"pixel_placed","data":{}}"#).unwrap();
        assert!(unknown.is_none());
        assert!(server_only.is_none());
    }

    #[test]
    fn test_decode_malformed_frames_are_errors() {
        // テスト項目: 壊れた JSON と既知 type の不正な data はエラーになる
        assert!(matches!(
            ClientMessage::decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"join_canvas","data":{"canvasId":5}}"#),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_server_message_decodes_pixel_placed() {
        // テスト項目: クライアント側で pixel_placed を解析できる
        // given (前提条件):
        let original = ServerMessage::PixelPlaced(PixelPlacedData {
            canvas_id: "main".to_string(),
            x: 3,
            y: 4,
            color: "#FF0000".to_string(),
            timestamp: 42,
            user_id: Some("alice".to_string()),
            username: None,
        });

        // when (操作):
        let json = original.encode(42).unwrap();
        let decoded = ServerMessage::decode(&json).unwrap().unwrap();

        // then (期待する結果):
        assert_eq!(decoded.message, original);
        assert!(!json.contains("username"));
    }
}
