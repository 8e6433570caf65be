//! Interactive CLI client for the shared pixel canvas.
//!
//! Joins one canvas over WebSocket, shows viewer counts and pixel events as
//! they arrive, and places pixels over HTTP. Reconnects automatically with
//! exponential backoff when the connection drops.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin pixelwall-client -- --user-id alice
//! cargo run --bin pixelwall-client -- --canvas-id lobby --url ws://127.0.0.1:3000/ws --api http://127.0.0.1:3000
//! ```

use std::time::Duration;

use clap::Parser;

use pixelwall_client::{ClientConfig, run_client, state::ReconnectPolicy};
use pixelwall_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "pixelwall-client")]
#[command(about = "Shared pixel canvas client", long_about = None)]
struct Args {
    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// HTTP API base URL
    #[arg(short = 'a', long, default_value = "http://127.0.0.1:8080")]
    api: String,

    /// Canvas to join
    #[arg(short = 'c', long, default_value = "default")]
    canvas_id: String,

    /// User ID sent with placements; "anonymous" when omitted
    #[arg(short = 'i', long, default_value = "anonymous")]
    user_id: String,

    /// Reconnection attempts before giving up
    #[arg(long, default_value = "10")]
    max_attempts: u32,

    #[arg(long, default_value = "1000")]
    base_delay_ms: u64,

    #[arg(long, default_value = "30000")]
    max_delay_ms: u64,

    /// Seconds without any frame from the server before reconnecting
    #[arg(long, default_value = "45")]
    liveness_timeout_secs: u64,

    /// Seconds before an HTTP request to the API is abandoned
    #[arg(long, default_value = "10")]
    request_timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = ClientConfig {
        ws_url: args.url,
        api_url: args.api,
        canvas_id: args.canvas_id,
        user_id: args.user_id,
        policy: ReconnectPolicy {
            base_delay: Duration::from_millis(args.base_delay_ms),
            max_delay: Duration::from_millis(args.max_delay_ms),
            max_attempts: args.max_attempts,
        },
        liveness_timeout: Duration::from_secs(args.liveness_timeout_secs),
        request_timeout: Duration::from_secs(args.request_timeout_secs),
    };

    // Run the client
    if let Err(e) = run_client(config).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
