//! UseCase layer.
//!
//! Each use case is an explicitly constructed service wired with the
//! collaborators it needs; there is no process-wide singleton.

mod broadcast;
mod error;
mod get_canvas_state;
mod heartbeat;
mod join_canvas;
mod leave_canvas;
mod place_pixel;

pub use broadcast::BroadcastUseCase;
pub use error::{JoinError, PlaceError, StateError};
pub use get_canvas_state::{CanvasSnapshot, GetCanvasStateUseCase};
pub use heartbeat::{HeartbeatConfig, HeartbeatHandle, HeartbeatMonitor};
pub use join_canvas::{JoinCanvasUseCase, JoinReceipt, JoinRequest};
pub use leave_canvas::LeaveCanvasUseCase;
pub use place_pixel::{PlacePixelCommand, PlacePixelUseCase};
