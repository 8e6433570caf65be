//! Integration tests for the canvas server.
//!
//! Each test starts its own server in-process on an ephemeral port and drives
//! it over real sockets with `tokio-tungstenite` and `reqwest`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use pixelwall_server::{
    domain::{AuthMode, CanvasConfig, CanvasId},
    infrastructure::{
        cooldown::InMemoryCooldownGate, identity::ClaimsIdentityResolver,
        registry::InMemoryConnectionRegistry, store::InMemoryPixelStore,
    },
    ui::{Server, ServerError},
    usecase::HeartbeatConfig,
};
use pixelwall_shared::time::SystemClock;
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::JoinHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

/// Helper struct to manage server lifecycle
struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<(), ServerError>>>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(canvas(10, 10, 5), HeartbeatConfig::default()).await
    }

    async fn start_with(canvas: CanvasConfig, heartbeat: HeartbeatConfig) -> Self {
        let server = Server::new(
            Arc::new(InMemoryPixelStore::with_canvases([canvas])),
            Arc::new(InMemoryConnectionRegistry::new()),
            Arc::new(InMemoryCooldownGate::new()),
            Arc::new(ClaimsIdentityResolver::new()),
            Arc::new(SystemClock),
            heartbeat,
        );
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let (shutdown, stop) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = stop.await;
        }));

        TestServer {
            addr,
            shutdown: Some(shutdown),
            handle: Some(handle),
        }
    }

    fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/ws{}", self.addr, query)
    }

    fn api(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(WAIT, handle).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

fn canvas(width: u32, height: u32, cooldown_seconds: u64) -> CanvasConfig {
    CanvasConfig {
        canvas_id: CanvasId::new("main".to_string()).unwrap(),
        width,
        height,
        cooldown_seconds,
        allowed_colors: None,
        auth_mode: AuthMode::Anyone,
    }
}

async fn connect(url: &str) -> Socket {
    let (socket, _) = connect_async(url).await.expect("Failed to connect");
    socket
}

/// Next text frame as JSON, skipping transport-level frames.
async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(WAIT, socket.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Socket closed")
            .expect("Socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("Invalid JSON frame");
        }
    }
}

/// Next frame of the given type.
async fn next_of_type(socket: &mut Socket, kind: &str) -> Value {
    loop {
        let frame = next_json(socket).await;
        if frame["type"] == kind {
            return frame;
        }
    }
}

/// Close code of the next close frame.
async fn next_close_code(socket: &mut Socket) -> u16 {
    loop {
        let frame = tokio::time::timeout(WAIT, socket.next())
            .await
            .expect("Timed out waiting for close")
            .expect("Socket ended without a close frame")
            .expect("Socket error");
        if let Message::Close(Some(close)) = frame {
            return u16::from(close.code);
        }
    }
}

async fn send(socket: &mut Socket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send");
}

#[tokio::test]
async fn test_health_check() {
    // テスト項目: ヘルスチェックが {"status":"ok"} を返す
    let server = TestServer::start().await;

    let body: Value = reqwest::get(server.api("/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body, json!({"status": "ok"}));
    server.stop().await;
}

#[tokio::test]
async fn test_join_via_query_and_viewer_counts() {
    // テスト項目: 参加・退出に合わせて視聴者数が全員に通知される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = connect(&server.ws_url("?canvasId=main&userId=alice")).await;

    // when (操作) / then (期待する結果):
    let connected = next_of_type(&mut alice, "connected").await;
    assert_eq!(connected["data"]["canvasId"], "main");
    assert_eq!(connected["data"]["userId"], "alice");
    assert_eq!(connected["data"]["connectedUsers"], 1);
    let count = next_of_type(&mut alice, "user_count_update").await;
    assert_eq!(count["data"]["connectedUsers"], 1);

    let mut bob = connect(&server.ws_url("?canvasId=main&userId=bob")).await;
    assert_eq!(
        next_of_type(&mut bob, "connected").await["data"]["connectedUsers"],
        2
    );
    assert_eq!(
        next_of_type(&mut alice, "user_count_update").await["data"]["connectedUsers"],
        2
    );

    let viewers: Value = reqwest::get(server.api("/api/canvas/main/viewers"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(viewers, json!({"canvasId": "main", "connectedUsers": 2}));

    bob.close(None).await.unwrap();
    assert_eq!(
        next_of_type(&mut alice, "user_count_update").await["data"]["connectedUsers"],
        1
    );
    server.stop().await;
}

#[tokio::test]
async fn test_join_canvas_message() {
    // テスト項目: canvasId なしで接続し、join_canvas で参加できる
    let server = TestServer::start().await;
    let mut socket = connect(&server.ws_url("")).await;

    send(
        &mut socket,
        json!({"type": "join_canvas", "data": {"canvasId": "main", "userId": "carol"}}),
    )
    .await;

    let connected = next_of_type(&mut socket, "connected").await;
    assert_eq!(connected["data"]["userId"], "carol");
    assert_eq!(connected["data"]["connectedUsers"], 1);
    server.stop().await;
}

#[tokio::test]
async fn test_join_without_canvas_closes_with_policy_violation() {
    // テスト項目: canvasId のない join_canvas は 1008 で切断される
    let server = TestServer::start().await;
    let mut socket = connect(&server.ws_url("")).await;

    send(&mut socket, json!({"type": "join_canvas", "data": {}})).await;

    assert_eq!(next_close_code(&mut socket).await, 1008);
    server.stop().await;
}

#[tokio::test]
async fn test_ping_is_answered_and_malformed_frames_are_ignored() {
    // テスト項目: 不正なメッセージは無視され、接続は維持される（ping に pong が返る）
    let server = TestServer::start().await;
    let mut socket = connect(&server.ws_url("?canvasId=main")).await;
    next_of_type(&mut socket, "user_count_update").await;

    socket
        .send(Message::Text("not json".into()))
        .await
        .unwrap();
    send(&mut socket, json!({"type": "mystery", "data": {}})).await;
    send(&mut socket, json!({"type": "ping", "data": {}})).await;

    let pong = next_of_type(&mut socket, "pong").await;
    assert!(pong["timestamp"].is_i64());
    server.stop().await;
}

#[tokio::test]
async fn test_placement_is_broadcast_and_persisted() {
    // テスト項目: 成功した配置が全員に届き、直後の状態取得に含まれる
    // given (前提条件):
    let server = TestServer::start().await;
    let mut viewer = connect(&server.ws_url("?canvasId=main")).await;
    next_of_type(&mut viewer, "user_count_update").await;
    let client = reqwest::Client::new();

    // when (操作):
    let response = client
        .post(server.api("/api/canvas/main/place"))
        .json(&json!({"x": 3, "y": 4, "color": "#00ff00", "userId": "alice"}))
        .send()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"success": true}));

    let placed = next_of_type(&mut viewer, "pixel_placed").await;
    assert_eq!(placed["data"]["x"], 3);
    assert_eq!(placed["data"]["y"], 4);
    assert_eq!(placed["data"]["color"], "#00FF00");
    assert_eq!(placed["data"]["userId"], "alice");

    let state: Value = client
        .get(server.api("/api/canvas/main"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["width"], 10);
    assert_eq!(state["cooldownSeconds"], 5);
    assert_eq!(state["authMode"], "anyone");
    let pixels = state["pixels"].as_array().unwrap();
    assert_eq!(pixels.len(), 1);
    assert_eq!(pixels[0]["color"], "#00FF00");
    server.stop().await;
}

#[tokio::test]
async fn test_second_placement_within_cooldown_is_rate_limited() {
    // テスト項目: クールダウン中の配置は 429 と残り時間を返し、ブロードキャストされない
    // given (前提条件):
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let url = server.api("/api/canvas/main/place");
    let body = json!({"x": 0, "y": 0, "color": "#FF0000", "userId": "alice"});
    assert_eq!(client.post(&url).json(&body).send().await.unwrap().status(), 200);

    // when (操作):
    let response = client.post(&url).json(&body).send().await.unwrap();

    // then (期待する結果):
    assert_eq!(response.status(), 429);
    let retry_after: u64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=5).contains(&retry_after));
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["success"], false);
    assert_eq!(error["error"], "rate_limited");
    let remaining = error["retryAfterMs"].as_i64().unwrap();
    assert!(remaining > 0 && remaining <= 5_000);

    let state: Value = reqwest::get(server.api("/api/canvas/main"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["pixels"].as_array().unwrap().len(), 1);
    server.stop().await;
}

#[tokio::test]
async fn test_placement_validation_errors() {
    // テスト項目: 検証エラーが 400 / 404 と snake_case のエラーコードで返る
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let cases = [
        ("main", json!({"x": -1, "y": 0, "color": "#FF0000"}), 400, "invalid_coordinates"),
        ("main", json!({"x": 10, "y": 0, "color": "#FF0000"}), 400, "invalid_coordinates"),
        ("main", json!({"x": "1", "y": 0, "color": "#FF0000"}), 400, "invalid_coordinates"),
        ("main", json!({"x": 1, "y": 0, "color": "red"}), 400, "invalid_color"),
        ("nowhere", json!({"x": 1, "y": 0, "color": "#FF0000"}), 404, "canvas_not_found"),
    ];

    for (canvas_id, body, status, code) in cases {
        let response = client
            .post(server.api(&format!("/api/canvas/{canvas_id}/place")))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), status, "body: {body}");
        let error: Value = response.json().await.unwrap();
        assert_eq!(error["success"], false);
        assert_eq!(error["error"], code);
    }
    server.stop().await;
}

#[tokio::test]
async fn test_user_only_canvas_rejects_guests() {
    // テスト項目: user_only のキャンバスではゲストの配置が 403 になる
    let mut config = canvas(10, 10, 0);
    config.auth_mode = AuthMode::UserOnly;
    let server = TestServer::start_with(config, HeartbeatConfig::default()).await;
    let client = reqwest::Client::new();
    let url = server.api("/api/canvas/main/place");

    let guest = client
        .post(&url)
        .json(&json!({"x": 0, "y": 0, "color": "#FF0000", "userId": "guest_42"}))
        .send()
        .await
        .unwrap();
    let user = client
        .post(&url)
        .json(&json!({"x": 0, "y": 0, "color": "#FF0000", "userId": "alice"}))
        .send()
        .await
        .unwrap();

    assert_eq!(guest.status(), 403);
    assert_eq!(user.status(), 200);
    server.stop().await;
}

#[tokio::test]
async fn test_unknown_canvas_state_is_not_found() {
    // テスト項目: 存在しないキャンバスの状態取得は 404
    let server = TestServer::start().await;

    let response = reqwest::get(server.api("/api/canvas/nowhere")).await.unwrap();

    assert_eq!(response.status(), 404);
    server.stop().await;
}

#[tokio::test]
async fn test_silent_client_is_dropped_by_heartbeat() {
    // テスト項目: ping に応答しないクライアントはタイムアウトで 1001 切断され、視聴者数から外れる
    // given (前提条件):
    let heartbeat = HeartbeatConfig {
        interval: Duration::from_millis(200),
        grace: Duration::from_millis(200),
    };
    let server = TestServer::start_with(canvas(10, 10, 0), heartbeat).await;
    let mut silent = connect(&server.ws_url("?canvasId=main")).await;
    next_of_type(&mut silent, "user_count_update").await;

    // when (操作): 何も送らずに待つ
    let code = next_close_code(&mut silent).await;

    // then (期待する結果):
    assert_eq!(code, 1001);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let viewers: Value = reqwest::get(server.api("/api/canvas/main/viewers"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(viewers["connectedUsers"], 0);
    server.stop().await;
}

#[tokio::test]
async fn test_socket_that_never_joins_is_closed() {
    // テスト項目: join_canvas を送らない接続はハートビートのタイムアウト後に 1008 で閉じられる
    // given (前提条件):
    let heartbeat = HeartbeatConfig {
        interval: Duration::from_millis(200),
        grace: Duration::from_millis(200),
    };
    let server = TestServer::start_with(canvas(10, 10, 0), heartbeat).await;
    let mut idle = connect(&server.ws_url("")).await;

    // when (操作): 参加せずに待つ
    let code = next_close_code(&mut idle).await;

    // then (期待する結果):
    assert_eq!(code, 1008);
    server.stop().await;
}

#[tokio::test]
async fn test_join_message_lifts_the_join_deadline() {
    // テスト項目: join_canvas で参加した接続は参加期限では閉じられず、以後はハートビートで管理される
    // given (前提条件):
    let heartbeat = HeartbeatConfig {
        interval: Duration::from_millis(200),
        grace: Duration::from_millis(200),
    };
    let server = TestServer::start_with(canvas(10, 10, 0), heartbeat).await;
    let mut socket = connect(&server.ws_url("")).await;

    // when (操作):
    send(
        &mut socket,
        json!({"type": "join_canvas", "data": {"canvasId": "main", "userId": "alice"}}),
    )
    .await;
    next_of_type(&mut socket, "connected").await;

    // then (期待する結果): ping に応答しないので 1001 (ハートビート) で切断される
    assert_eq!(next_close_code(&mut socket).await, 1001);
    server.stop().await;
}
