//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde_json::Value;

use crate::{
    domain::IdentityClaims,
    infrastructure::dto::http::{
        CanvasStateDto, PlacePixelRequest, PlacePixelResponse, ViewerCountDto,
    },
    ui::state::AppState,
    usecase::PlacePixelCommand,
};

use super::error::ApiError;

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Current config and every painted cell of a canvas
pub async fn get_canvas(
    State(state): State<Arc<AppState>>,
    Path(canvas_id): Path<String>,
) -> Result<Json<CanvasStateDto>, ApiError> {
    let snapshot = state.get_canvas_state_usecase.execute(&canvas_id).await?;

    // Domain Model から DTO への変換
    Ok(Json(CanvasStateDto::new(&snapshot.config, &snapshot.pixels)))
}

pub async fn get_viewers(
    State(state): State<Arc<AppState>>,
    Path(canvas_id): Path<String>,
) -> Result<Json<ViewerCountDto>, ApiError> {
    let (canvas_id, connected_users) = state.get_canvas_state_usecase.viewer_count(&canvas_id)?;
    Ok(Json(ViewerCountDto {
        canvas_id: canvas_id.into_string(),
        connected_users,
    }))
}

/// Place one pixel
///
/// The placement runs on its own task so that a client dropping the
/// request does not cancel a write that is already under way.
pub async fn place_pixel(
    State(state): State<Arc<AppState>>,
    Path(canvas_id): Path<String>,
    body: Result<Json<PlacePixelRequest>, JsonRejection>,
) -> Result<Json<PlacePixelResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    // DTO から Command への変換
    let command = PlacePixelCommand {
        canvas_id,
        x: integer(&request.x),
        y: integer(&request.y),
        color: request.color.as_str().map(str::to_string),
        claims: IdentityClaims::from(&request),
    };

    let usecase = state.place_pixel_usecase.clone();
    let handle = tokio::spawn(async move { usecase.execute(command).await });
    match handle.await {
        Ok(result) => {
            result?;
            Ok(Json(PlacePixelResponse { success: true }))
        }
        Err(e) => Err(ApiError::Internal(format!("placement task failed: {e}"))),
    }
}

/// Integral JSON number, `3.0` included.
fn integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
