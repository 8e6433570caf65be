//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use pixelwall_shared::time::Clock;

use crate::{
    domain::{ConnectionRegistry, CooldownGate, IdentityResolver, PixelStore},
    usecase::{
        BroadcastUseCase, GetCanvasStateUseCase, HeartbeatConfig, HeartbeatMonitor,
        JoinCanvasUseCase, LeaveCanvasUseCase, PlacePixelUseCase,
    },
};

use super::{
    handler::{get_canvas, get_viewers, health_check, place_pixel, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Bind address and heartbeat settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub heartbeat: HeartbeatConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

/// Pixel canvas server
///
/// Every collaborator is passed in explicitly, so several isolated servers
/// can run in one process.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(store, registry, cooldown, identity, clock, config.heartbeat);
/// server.run(&config.host, config.port).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    /// Create a new Server instance
    ///
    /// # Arguments
    ///
    /// * `store` - Canvas config and pixel store
    /// * `registry` - Live connections grouped by canvas
    /// * `cooldown` - Per-(canvas, user) rate limiter
    /// * `identity` - Resolves request identity claims
    /// * `clock` - Time source for timestamps, cooldowns and heartbeats
    /// * `heartbeat` - Ping interval and grace period
    pub fn new(
        store: Arc<dyn PixelStore>,
        registry: Arc<dyn ConnectionRegistry>,
        cooldown: Arc<dyn CooldownGate>,
        identity: Arc<dyn IdentityResolver>,
        clock: Arc<dyn Clock>,
        heartbeat: HeartbeatConfig,
    ) -> Self {
        let leave_canvas_usecase =
            Arc::new(LeaveCanvasUseCase::new(registry.clone(), clock.clone()));
        let broadcast_usecase = Arc::new(BroadcastUseCase::new(
            registry.clone(),
            leave_canvas_usecase.clone(),
            clock.clone(),
        ));
        let join_canvas_usecase = Arc::new(JoinCanvasUseCase::new(
            registry.clone(),
            broadcast_usecase.clone(),
            clock.clone(),
        ));
        let place_pixel_usecase = Arc::new(PlacePixelUseCase::new(
            store.clone(),
            cooldown,
            identity,
            broadcast_usecase,
            clock.clone(),
        ));
        let get_canvas_state_usecase =
            Arc::new(GetCanvasStateUseCase::new(store, registry.clone()));
        let heartbeat_monitor = Arc::new(HeartbeatMonitor::new(
            registry,
            leave_canvas_usecase.clone(),
            clock.clone(),
            heartbeat,
        ));

        Self {
            state: Arc::new(AppState {
                join_canvas_usecase,
                leave_canvas_usecase,
                place_pixel_usecase,
                get_canvas_state_usecase,
                heartbeat_monitor,
                clock,
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/canvas/{canvas_id}", get(get_canvas))
            .route("/api/canvas/{canvas_id}/viewers", get(get_viewers))
            .route("/api/canvas/{canvas_id}/place", post(place_pixel))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server until Ctrl+C / SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: &str, port: u16) -> Result<(), ServerError> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Pixel canvas server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// The heartbeat monitor runs for exactly as long as the server does.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let heartbeat = self.state.heartbeat_monitor.clone().start();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        heartbeat.shutdown().await;
        tracing::info!("Server shutdown complete");

        result.map_err(Into::into)
    }
}
