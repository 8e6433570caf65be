//! Shared application state.

use std::sync::Arc;

use pixelwall_shared::time::Clock;

use crate::usecase::{
    GetCanvasStateUseCase, HeartbeatMonitor, JoinCanvasUseCase, LeaveCanvasUseCase,
    PlacePixelUseCase,
};

/// Shared application state
pub struct AppState {
    /// JoinCanvasUseCase（ルーム参加のユースケース）
    pub join_canvas_usecase: Arc<JoinCanvasUseCase>,
    /// LeaveCanvasUseCase（ルーム退出のユースケース）
    pub leave_canvas_usecase: Arc<LeaveCanvasUseCase>,
    /// PlacePixelUseCase（ピクセル配置のユースケース）
    pub place_pixel_usecase: Arc<PlacePixelUseCase>,
    /// GetCanvasStateUseCase（キャンバス状態取得のユースケース）
    pub get_canvas_state_usecase: Arc<GetCanvasStateUseCase>,
    /// HeartbeatMonitor（ハートビート監視）
    pub heartbeat_monitor: Arc<HeartbeatMonitor>,
    pub clock: Arc<dyn Clock>,
}
