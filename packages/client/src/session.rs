//! WebSocket session driver.
//!
//! One session is one socket. It forwards decoded server messages to the
//! runner, answers `ping` with `pong`, and ends with a [`SessionEnd`] that
//! says how the socket went away. Reconnecting is the runner's job.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::Instant,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::{CloseFrame, Message, frame::coding::CloseCode},
};

use pixelwall_server::infrastructure::dto::websocket::{ClientMessage, Heartbeat, ServerMessage};
use pixelwall_shared::time::get_utc_timestamp;

use crate::{error::ClientError, state::CloseKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Handshake finished
    Opened,
    Message(ServerMessage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    pub kind: CloseKind,
    pub reason: String,
}

impl SessionEnd {
    fn new(kind: CloseKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Handle to a running session task
pub struct SessionHandle {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<SessionEnd>,
}

impl SessionHandle {
    /// Queue a message for the server. `false` once the session is gone.
    pub fn send(&self, message: ClientMessage) -> bool {
        self.outgoing.send(message).is_ok()
    }

    /// Close the socket normally.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Wait for the session to end. Call at most once.
    pub async fn finished(&mut self) -> SessionEnd {
        match (&mut self.task).await {
            Ok(end) => end,
            Err(e) => SessionEnd::new(CloseKind::Abnormal, format!("session task failed: {e}")),
        }
    }
}

/// Open a socket to `url` on a new task.
pub fn spawn_session(
    url: String,
    liveness_timeout: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> SessionHandle {
    let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
    let (stop, stop_rx) = oneshot::channel();
    let task = tokio::spawn(run_session(url, liveness_timeout, events, outgoing_rx, stop_rx));
    SessionHandle {
        outgoing,
        stop: Some(stop),
        task,
    }
}

async fn run_session(
    url: String,
    liveness_timeout: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut outgoing: mpsc::UnboundedReceiver<ClientMessage>,
    mut stop: oneshot::Receiver<()>,
) -> SessionEnd {
    let (socket, _) = match connect_async(&url).await {
        Ok(result) => result,
        Err(e) => {
            let error = ClientError::ConnectionError(e.to_string());
            return SessionEnd::new(CloseKind::Abnormal, error.to_string());
        }
    };
    tracing::info!("Connected to {}", url);
    let _ = events.send(SessionEvent::Opened);

    let (mut write, mut read) = socket.split();
    let mut deadline = Instant::now() + liveness_timeout;

    loop {
        tokio::select! {
            _ = &mut stop => {
                let _ = write
                    .send(Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client disconnect".into(),
                    })))
                    .await;
                return SessionEnd::new(CloseKind::Normal, "disconnected by user");
            }
            Some(message) = outgoing.recv() => {
                let json = match message.encode(get_utc_timestamp()) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("{}", ClientError::Protocol(e.to_string()));
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    return SessionEnd::new(CloseKind::Abnormal, format!("send failed: {e}"));
                }
            }
            next = tokio::time::timeout_at(deadline, read.next()) => {
                let frame = match next {
                    Err(_) => {
                        tracing::warn!("No frame from server for {:?}, closing", liveness_timeout);
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnd::new(CloseKind::LivenessTimeout, "server went silent");
                    }
                    Ok(None) => return SessionEnd::new(CloseKind::Abnormal, "stream ended"),
                    Ok(Some(Err(e))) => {
                        return SessionEnd::new(CloseKind::Abnormal, format!("read failed: {e}"));
                    }
                    Ok(Some(Ok(frame))) => frame,
                };
                deadline = Instant::now() + liveness_timeout;

                match frame {
                    Message::Text(text) => match ServerMessage::decode(text.as_str()) {
                        Ok(Some(decoded)) => {
                            if let ServerMessage::Ping(_) = decoded.message {
                                let pong = ClientMessage::Pong(Heartbeat {});
                                if let Ok(json) = pong.encode(get_utc_timestamp()) {
                                    let _ = write.send(Message::Text(json.into())).await;
                                }
                            } else {
                                let _ = events.send(SessionEvent::Message(decoded.message));
                            }
                        }
                        Ok(None) => tracing::debug!("Ignoring unhandled message: {}", text),
                        Err(e) => {
                            let error = ClientError::Protocol(e.to_string());
                            tracing::warn!("Dropping frame: {}", error);
                        }
                    },
                    Message::Close(close) => {
                        let code = close.as_ref().map(|frame| u16::from(frame.code));
                        let reason = close
                            .map(|frame| frame.reason.as_str().to_string())
                            .unwrap_or_default();
                        tracing::info!("Server closed the connection ({:?}) {}", code, reason);
                        return SessionEnd::new(CloseKind::from_code(code), reason);
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelwall_server::infrastructure::dto::websocket::JoinCanvasData;
    use serde_json::Value;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - サーバーの ping に pong で応答する
    // - 一定時間サーバーから何も届かなければ自分から切断する
    // - close コードに応じて終了理由が分類される
    // ========================================

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        (listener, url)
    }

    #[tokio::test]
    async fn test_ping_is_answered_and_messages_are_forwarded() {
        // テスト項目: ping に pong が返り、送信キューのメッセージがサーバーに届く
        // given (前提条件):
        let (listener, url) = listener().await;
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut handle = spawn_session(url, Duration::from_secs(5), events_tx);
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = accept_async(stream).await.unwrap();
        assert_eq!(events.recv().await, Some(SessionEvent::Opened));

        // when (操作):
        handle.send(ClientMessage::JoinCanvas(JoinCanvasData {
            canvas_id: Some("main".to_string()),
            user_id: None,
        }));
        let join = server.next().await.unwrap().unwrap();
        server
            .send(Message::Text(
                r#"{"type":"ping","data":{},"timestamp":1}"#.into(),
            ))
            .await
            .unwrap();
        let pong = server.next().await.unwrap().unwrap();

        // then (期待する結果):
        let join: Value = serde_json::from_str(join.to_text().unwrap()).unwrap();
        assert_eq!(join["type"], "join_canvas");
        assert_eq!(join["data"]["canvasId"], "main");
        let pong: Value = serde_json::from_str(pong.to_text().unwrap()).unwrap();
        assert_eq!(pong["type"], "pong");

        handle.stop();
        assert_eq!(handle.finished().await.kind, CloseKind::Normal);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped_and_messages_are_forwarded() {
        // テスト項目: 壊れたフレームは捨てられ、続くサーバーからのメッセージがイベントとして届く
        let (listener, url) = listener().await;
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut handle = spawn_session(url, Duration::from_secs(5), events_tx);
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = accept_async(stream).await.unwrap();
        events.recv().await;

        server.send(Message::Text("{not json".into())).await.unwrap();
        server
            .send(Message::Text(
                r#"{"type":"user_count_update","data":{"canvasId":"main","connectedUsers":3}}"#
                    .into(),
            ))
            .await
            .unwrap();

        match events.recv().await {
            Some(SessionEvent::Message(ServerMessage::UserCountUpdate(data))) => {
                assert_eq!(data.connected_users, 3);
            }
            other => panic!("unexpected event {other:?}"),
        }
        handle.stop();
        handle.finished().await;
    }

    #[tokio::test]
    async fn test_silent_server_triggers_liveness_timeout() {
        // テスト項目: サーバーが沈黙すると LivenessTimeout で終了する
        let (listener, url) = listener().await;
        let (events_tx, _events) = mpsc::unbounded_channel();
        let mut handle = spawn_session(url, Duration::from_millis(200), events_tx);
        let (stream, _) = listener.accept().await.unwrap();
        let _server = accept_async(stream).await.unwrap();

        let end = handle.finished().await;

        assert_eq!(end.kind, CloseKind::LivenessTimeout);
    }

    #[tokio::test]
    async fn test_policy_violation_close_is_rejected() {
        // テスト項目: 1008 で閉じられると Rejected として終了する
        let (listener, url) = listener().await;
        let (events_tx, _events) = mpsc::unbounded_channel();
        let mut handle = spawn_session(url, Duration::from_secs(5), events_tx);
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = accept_async(stream).await.unwrap();

        server
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Policy,
                reason: "invalid room".into(),
            })))
            .await
            .unwrap();

        let end = handle.finished().await;
        assert_eq!(end.kind, CloseKind::Rejected);
        assert_eq!(end.reason, "invalid room");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_abnormal() {
        // テスト項目: 接続できない場合は Abnormal で終了する
        let (listener, url) = listener().await;
        drop(listener);
        let (events_tx, _events) = mpsc::unbounded_channel();
        let mut handle = spawn_session(url, Duration::from_secs(5), events_tx);

        let end = handle.finished().await;

        assert_eq!(end.kind, CloseKind::Abnormal);
        assert!(end.reason.starts_with("Connection error: "));
    }
}
