//! Message formatting utilities for client display.

use std::time::Duration;

use pixelwall_server::infrastructure::dto::websocket::PixelPlacedData;
use pixelwall_shared::time::timestamp_to_rfc3339;

use crate::{
    canvas::{CanvasView, Cell},
    state::ConnectionState,
};

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    pub fn format_connected(canvas_id: &str, user_id: &str, viewers: usize) -> String {
        format!(
            "\n\n============================================================\n\
             Joined canvas '{}' as '{}' ({} viewing)\n\
             ============================================================\n",
            canvas_id, user_id, viewers
        )
    }

    pub fn format_snapshot(view: &CanvasView) -> String {
        let (width, height) = view.dimensions();
        format!(
            "Canvas {}x{}, {} painted cells, cooldown {}s\n",
            width,
            height,
            view.painted(),
            view.cooldown_seconds()
        )
    }

    pub fn format_viewer_count(viewers: usize) -> String {
        format!("\n* {} viewing\n", viewers)
    }

    /// Format a pixel_placed broadcast
    ///
    /// # Arguments
    ///
    /// * `pixel` - The broadcast payload
    /// * `current_user_id` - The current user's ID (to mark own placements)
    pub fn format_pixel_placed(pixel: &PixelPlacedData, current_user_id: &str) -> String {
        let author = pixel.username.as_deref().or(pixel.user_id.as_deref());
        let by = match author {
            Some(name) if pixel.user_id.as_deref() == Some(current_user_id) => {
                format!(" by {} (me)", name)
            }
            Some(name) => format!(" by {}", name),
            None => String::new(),
        };
        format!(
            "\n# ({}, {}) = {}{} at {}\n",
            pixel.x,
            pixel.y,
            pixel.color,
            by,
            timestamp_to_rfc3339(pixel.timestamp)
        )
    }

    pub fn format_cell(x: u32, y: u32, cell: Option<&Cell>) -> String {
        match cell {
            None => format!("({}, {}) is unpainted\n", x, y),
            Some(cell) if cell.provisional => {
                format!("({}, {}) = {} (pending confirmation)\n", x, y, cell.color)
            }
            Some(cell) => format!(
                "({}, {}) = {}{} at {}\n",
                x,
                y,
                cell.color,
                cell.user_id
                    .as_deref()
                    .map(|user| format!(" by {}", user))
                    .unwrap_or_default(),
                timestamp_to_rfc3339(cell.timestamp)
            ),
        }
    }

    pub fn format_status(
        state: ConnectionState,
        attempts: u32,
        view: &CanvasView,
        cooldown: Option<Duration>,
    ) -> String {
        let connection = match state {
            ConnectionState::Connected => "connected".to_string(),
            ConnectionState::Connecting => "connecting".to_string(),
            ConnectionState::Reconnecting => format!("reconnecting (attempt {})", attempts),
            ConnectionState::Disconnected => "disconnected".to_string(),
        };
        let cooldown = match cooldown {
            Some(remaining) => format!("{:.1}s", remaining.as_secs_f64()),
            None => "ready".to_string(),
        };
        format!(
            "connection: {}\ncanvas: {} ({} viewing, {} painted, {} pending)\ncooldown: {}\n",
            connection,
            view.canvas_id(),
            view.viewers(),
            view.painted(),
            view.provisional(),
            cooldown
        )
    }

    pub fn format_rate_limited(retry_after_ms: i64) -> String {
        format!(
            "Cooldown active: you can place again in {:.1}s\n",
            retry_after_ms.max(0) as f64 / 1000.0
        )
    }

    pub fn format_cooldown_tick(remaining: Duration) -> String {
        if remaining.is_zero() {
            "\n~ cooldown over, ready to place\n".to_string()
        } else {
            format!("\n~ cooldown {}s\n", remaining.as_secs_f64().ceil() as u64)
        }
    }

    /// Single-line indicator shown while retries run silently
    pub fn format_reconnecting(attempt: u32, max_attempts: u32, delay: Duration) -> String {
        format!(
            "\n[disconnected] retrying in {}s ({}/{})\n",
            delay.as_secs_f64(),
            attempt,
            max_attempts
        )
    }

    pub fn format_gave_up(attempts: u32) -> String {
        format!(
            "\n\n############################################################\n\
             DISCONNECTED: gave up after {} attempts.\n\
             Type 'reconnect' to try again.\n\
             ############################################################\n",
            attempts
        )
    }

    pub fn format_help() -> String {
        "Commands:\n  \
         place <x> <y> <#RRGGBB>  place a pixel\n  \
         show <x> <y>             show one cell\n  \
         status                   connection and cooldown\n  \
         disconnect               close the connection\n  \
         reconnect                connect again\n  \
         quit                     exit\n"
            .to_string()
    }
}
