//! Real-time pixel canvas server.
//!
//! Serves one seeded in-memory canvas over HTTP and WebSocket.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin pixelwall-server
//! cargo run --bin pixelwall-server -- --port 3000 --canvas-id lobby --width 32 --height 32 --cooldown 10
//! cargo run --bin pixelwall-server -- --palette '#000000,#FFFFFF' --auth-mode user_or_guest
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use pixelwall_server::{
    domain::{AuthMode, CanvasConfig, CanvasId, HexColor, ValueObjectError},
    infrastructure::{
        cooldown::InMemoryCooldownGate, identity::ClaimsIdentityResolver,
        registry::InMemoryConnectionRegistry, store::InMemoryPixelStore,
    },
    ui::{Server, ServerConfig},
    usecase::HeartbeatConfig,
};
use pixelwall_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "pixelwall-server")]
#[command(about = "Real-time shared pixel canvas server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Seconds between heartbeat sweeps
    #[arg(long, default_value = "30")]
    heartbeat_interval_secs: u64,

    /// Extra seconds a pinged connection gets before it is dropped
    #[arg(long, default_value = "10")]
    heartbeat_grace_secs: u64,

    /// Id of the seeded canvas
    #[arg(long, default_value = "default")]
    canvas_id: String,

    #[arg(long, default_value = "100")]
    width: u32,

    #[arg(long, default_value = "100")]
    height: u32,

    /// Seconds between placements of one user
    #[arg(long, default_value = "5")]
    cooldown: u64,

    /// Comma separated #RRGGBB colors; any color when omitted
    #[arg(long, value_delimiter = ',')]
    palette: Option<Vec<String>>,

    /// anyone | user_or_guest | user_only
    #[arg(long, default_value = "anyone")]
    auth_mode: AuthMode,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            heartbeat: HeartbeatConfig {
                interval: Duration::from_secs(self.heartbeat_interval_secs),
                grace: Duration::from_secs(self.heartbeat_grace_secs),
            },
        }
    }

    fn canvas_config(&self) -> Result<CanvasConfig, ValueObjectError> {
        let allowed_colors = self
            .palette
            .as_ref()
            .map(|colors| {
                colors
                    .iter()
                    .map(|color| HexColor::try_from(color.trim()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(CanvasConfig {
            canvas_id: CanvasId::new(self.canvas_id.clone())?,
            width: self.width,
            height: self.height,
            cooldown_seconds: self.cooldown,
            allowed_colors,
            auth_mode: self.auth_mode,
        })
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = args.server_config();

    // Initialize dependencies in order:
    // 1. Store (seeded canvas)
    // 2. Registry, cooldown gate, identity resolver, clock
    // 3. Server (wires the use cases)
    let canvas = match args.canvas_config() {
        Ok(canvas) => canvas,
        Err(e) => {
            tracing::error!("Invalid canvas options: {}", e);
            std::process::exit(2);
        }
    };
    tracing::info!(
        "Canvas '{}' ({}x{}, cooldown {}s, auth {}) created!",
        canvas.canvas_id,
        canvas.width,
        canvas.height,
        canvas.cooldown_seconds,
        canvas.auth_mode
    );
    let store = Arc::new(InMemoryPixelStore::with_canvases([canvas]));

    let server = Server::new(
        store,
        Arc::new(InMemoryConnectionRegistry::new()),
        Arc::new(InMemoryCooldownGate::new()),
        Arc::new(ClaimsIdentityResolver::new()),
        Arc::new(SystemClock),
        config.heartbeat,
    );
    if let Err(e) = server.run(&config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
