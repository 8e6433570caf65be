//! Client execution logic with reconnection support.
//!
//! Drives the [`ConnectionStateMachine`]: carries out its effects (sockets,
//! retry timers), feeds it socket outcomes, and keeps the [`CanvasView`]
//! reconciled with the server.

use std::{future::pending, pin::Pin, time::Duration};

use tokio::{
    sync::mpsc,
    time::{Instant, Sleep},
};

use pixelwall_server::{
    domain::UserId,
    infrastructure::dto::{
        http::PlacePixelRequest,
        websocket::{ClientMessage, JoinCanvasData, ServerMessage},
    },
};
use pixelwall_shared::time::get_utc_timestamp;

use crate::{
    api::ApiClient,
    canvas::CanvasView,
    error::ClientError,
    formatter::MessageFormatter,
    session::{SessionEnd, SessionEvent, SessionHandle, spawn_session},
    state::{ConnectionState, ConnectionStateMachine, Effect, ReconnectPolicy},
    ui::{Command, parse_command, redisplay_prompt, spawn_readline},
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:8080/ws`
    pub ws_url: String,
    /// HTTP base URL, e.g. `http://127.0.0.1:8080`
    pub api_url: String,
    pub canvas_id: String,
    pub user_id: String,
    pub policy: ReconnectPolicy,
    /// Silence from the server after which the socket is considered dead
    pub liveness_timeout: Duration,
    /// Upper bound for one HTTP request
    pub request_timeout: Duration,
}

struct Client {
    config: ClientConfig,
    api: ApiClient,
    view: CanvasView,
    machine: ConnectionStateMachine,
    events: mpsc::UnboundedSender<SessionEvent>,
    session: Option<SessionHandle>,
    retry: Option<Pin<Box<Sleep>>>,
    cooldown_until: Option<Instant>,
    prompt: String,
}

impl Client {
    fn show(&self, text: &str) {
        print!("{}", text);
        redisplay_prompt(&self.prompt);
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::Open => {
                tracing::info!(
                    "Connecting to {} (canvas '{}' as '{}')",
                    self.config.ws_url,
                    self.config.canvas_id,
                    self.config.user_id
                );
                self.session = Some(spawn_session(
                    self.config.ws_url.clone(),
                    self.config.liveness_timeout,
                    self.events.clone(),
                ));
            }
            Effect::SendJoin => {
                let join = ClientMessage::JoinCanvas(JoinCanvasData {
                    canvas_id: Some(self.config.canvas_id.clone()),
                    user_id: Some(self.config.user_id.clone()),
                });
                if let Some(session) = &self.session {
                    session.send(join);
                }
            }
            Effect::ScheduleRetry { attempt, delay } => {
                tracing::info!("Reconnecting in {:?} (attempt {})", delay, attempt);
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
                self.show(&MessageFormatter::format_reconnecting(
                    attempt,
                    self.machine.policy().max_attempts,
                    delay,
                ));
            }
            Effect::Stop => {
                self.retry = None;
                if let Some(session) = &mut self.session {
                    session.stop();
                }
                self.show("Disconnected.\n");
            }
            Effect::GiveUp { attempts } => {
                self.retry = None;
                tracing::error!("{}", ClientError::RetriesExhausted(attempts));
                self.show(&MessageFormatter::format_gave_up(attempts));
            }
        }
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Opened => {
                let effect = self.machine.on_open();
                self.apply(effect);
            }
            SessionEvent::Message(ServerMessage::Connected(data)) => {
                self.view.set_viewers(data.connected_users);
                self.show(&MessageFormatter::format_connected(
                    &data.canvas_id,
                    &data.user_id,
                    data.connected_users,
                ));
                // Refetch so that anything missed while disconnected is reconciled
                self.refresh().await;
            }
            SessionEvent::Message(ServerMessage::UserCountUpdate(data)) => {
                self.view.set_viewers(data.connected_users);
                self.show(&MessageFormatter::format_viewer_count(data.connected_users));
            }
            SessionEvent::Message(ServerMessage::PixelPlaced(pixel)) => {
                if self.view.apply_broadcast(&pixel) {
                    self.show(&MessageFormatter::format_pixel_placed(
                        &pixel,
                        &self.config.user_id,
                    ));
                }
            }
            SessionEvent::Message(ServerMessage::Ping(_) | ServerMessage::Pong(_)) => {}
        }
    }

    async fn refresh(&mut self) {
        match self.api.fetch_state(&self.config.canvas_id).await {
            Ok(snapshot) => {
                self.view.load_snapshot(&snapshot);
                self.show(&MessageFormatter::format_snapshot(&self.view));
            }
            Err(e) => {
                tracing::warn!("Failed to fetch canvas state: {}", e);
            }
        }
    }

    fn on_session_end(&mut self, end: SessionEnd) {
        tracing::info!("Session ended ({:?}): {}", end.kind, end.reason);
        self.session = None;
        let effect = self.machine.on_close(end.kind);
        self.apply(effect);
    }

    fn on_retry_timer(&mut self) {
        self.retry = None;
        let effect = self.machine.on_retry_timer();
        self.apply(effect);
    }

    fn cooldown_remaining(&self) -> Option<Duration> {
        self.cooldown_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
    }

    fn on_cooldown_tick(&mut self) {
        let remaining = self.cooldown_remaining().unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            self.cooldown_until = None;
        }
        self.show(&MessageFormatter::format_cooldown_tick(remaining));
    }

    async fn place(&mut self, x: u32, y: u32, color: String) {
        self.view.apply_optimistic(x, y, &color, get_utc_timestamp());

        let mut request = PlacePixelRequest::new(i64::from(x), i64::from(y), &color);
        if self.config.user_id != UserId::ANONYMOUS {
            request = request.with_user(&self.config.user_id);
        }

        match self.api.place(&self.config.canvas_id, &request).await {
            Ok(()) => {
                let cooldown = Duration::from_secs(self.view.cooldown_seconds());
                if !cooldown.is_zero() {
                    self.cooldown_until = Some(Instant::now() + cooldown);
                }
                self.show(&format!("Placed ({}, {}) = {}\n", x, y, color));
            }
            Err(ClientError::Placement {
                retry_after_ms: Some(ms),
                ..
            }) => {
                let wait = Duration::from_millis(u64::try_from(ms).unwrap_or(0));
                self.cooldown_until = Some(Instant::now() + wait);
                self.show(&MessageFormatter::format_rate_limited(ms));
            }
            Err(e) => {
                tracing::warn!("Placement failed: {}", e);
                self.show(&format!("{}\n", e));
            }
        }
    }

    /// Returns `false` when the client should exit.
    async fn handle_line(&mut self, line: &str) -> bool {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(e) => {
                self.show(&format!("{}\n", e));
                return true;
            }
        };

        match command {
            Command::Place { x, y, color } => self.place(x, y, color).await,
            Command::Show { x, y } => {
                self.show(&MessageFormatter::format_cell(x, y, self.view.get(x, y)));
            }
            Command::Status => {
                self.show(&MessageFormatter::format_status(
                    self.machine.state(),
                    self.machine.attempts(),
                    &self.view,
                    self.cooldown_remaining(),
                ));
            }
            Command::Disconnect => {
                let effect = self.machine.disconnect();
                self.apply(effect);
            }
            Command::Reconnect => {
                if self.machine.state() == ConnectionState::Disconnected {
                    let effect = self.machine.connect();
                    self.apply(effect);
                } else {
                    self.show("Already connected or connecting.\n");
                }
            }
            Command::Help => self.show(&MessageFormatter::format_help()),
            Command::Quit => return false,
        }
        true
    }
}

async fn session_finished(session: &mut Option<SessionHandle>) -> SessionEnd {
    match session {
        Some(session) => session.finished().await,
        None => pending().await,
    }
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

/// Run the canvas client until the user quits
pub async fn run_client(config: ClientConfig) -> Result<(), ClientError> {
    let (events, mut event_rx) = mpsc::unbounded_channel();
    let prompt = format!("{}@{}> ", config.user_id, config.canvas_id);
    let api = ApiClient::new(&config.api_url, config.request_timeout)?;
    let mut client = Client {
        api,
        view: CanvasView::new(&config.canvas_id),
        machine: ConnectionStateMachine::new(config.policy),
        events,
        session: None,
        retry: None,
        cooldown_until: None,
        prompt: prompt.clone(),
        config,
    };

    println!(
        "\nYou are '{}' on canvas '{}'. Type 'help' for commands, Ctrl+C to exit.\n",
        client.config.user_id, client.config.canvas_id
    );
    let mut input = spawn_readline(prompt);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    let effect = client.machine.connect();
    client.apply(effect);

    loop {
        tokio::select! {
            line = input.recv() => match line {
                Some(line) => {
                    if !client.handle_line(&line).await {
                        break;
                    }
                }
                None => break,
            },
            Some(event) = event_rx.recv() => client.handle_event(event).await,
            end = session_finished(&mut client.session), if client.session.is_some() => {
                client.on_session_end(end);
            }
            _ = retry_elapsed(&mut client.retry), if client.retry.is_some() => {
                client.on_retry_timer();
            }
            _ = ticker.tick(), if client.cooldown_until.is_some() => client.on_cooldown_tick(),
        }
    }

    let effect = client.machine.disconnect();
    if effect == Effect::Stop {
        client.retry = None;
        if let Some(session) = &mut client.session {
            session.stop();
            session.finished().await;
        }
    }
    tracing::info!("Client exited");
    Ok(())
}
