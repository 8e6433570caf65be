//! Local view of one canvas.
//!
//! Optimistic edits are written immediately and marked provisional.
//! Authoritative `pixel_placed` broadcasts overwrite a cell in arrival
//! order (last received wins), which matches the server's commit order.
//! A failed placement is not rolled back; the next broadcast or snapshot
//! for that cell replaces it.

use std::collections::HashMap;

use pixelwall_server::infrastructure::dto::{http::CanvasStateDto, websocket::PixelPlacedData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub color: String,
    pub timestamp: i64,
    pub user_id: Option<String>,
    /// Local edit not yet confirmed by a broadcast
    pub provisional: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CanvasView {
    canvas_id: String,
    width: u32,
    height: u32,
    cooldown_seconds: u64,
    cells: HashMap<(u32, u32), Cell>,
    viewers: usize,
}

impl CanvasView {
    pub fn new(canvas_id: &str) -> Self {
        Self {
            canvas_id: canvas_id.to_string(),
            ..Self::default()
        }
    }

    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn cooldown_seconds(&self) -> u64 {
        self.cooldown_seconds
    }

    pub fn viewers(&self) -> usize {
        self.viewers
    }

    pub fn painted(&self) -> usize {
        self.cells.len()
    }

    pub fn provisional(&self) -> usize {
        self.cells.values().filter(|cell| cell.provisional).count()
    }

    pub fn get(&self, x: u32, y: u32) -> Option<&Cell> {
        self.cells.get(&(x, y))
    }

    /// Replace everything with a fetched snapshot, provisional cells included.
    pub fn load_snapshot(&mut self, snapshot: &CanvasStateDto) {
        self.canvas_id = snapshot.canvas_id.clone();
        self.width = snapshot.width;
        self.height = snapshot.height;
        self.cooldown_seconds = snapshot.cooldown_seconds;
        self.cells = snapshot
            .pixels
            .iter()
            .map(|pixel| {
                (
                    (pixel.x, pixel.y),
                    Cell {
                        color: pixel.color.clone(),
                        timestamp: pixel.timestamp,
                        user_id: pixel.user_id.clone(),
                        provisional: false,
                    },
                )
            })
            .collect();
    }

    /// Paint a cell locally before the server confirms it.
    pub fn apply_optimistic(&mut self, x: u32, y: u32, color: &str, now: i64) {
        self.cells.insert(
            (x, y),
            Cell {
                color: color.to_uppercase(),
                timestamp: now,
                user_id: None,
                provisional: true,
            },
        );
    }

    /// Apply an authoritative broadcast. Returns `false` for other canvases.
    pub fn apply_broadcast(&mut self, pixel: &PixelPlacedData) -> bool {
        if pixel.canvas_id != self.canvas_id {
            return false;
        }
        self.cells.insert(
            (pixel.x, pixel.y),
            Cell {
                color: pixel.color.clone(),
                timestamp: pixel.timestamp,
                user_id: pixel.user_id.clone(),
                provisional: false,
            },
        );
        true
    }

    pub fn set_viewers(&mut self, viewers: usize) {
        self.viewers = viewers;
    }
}
