//! Mapping of use case errors to HTTP responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};

use thiserror::Error;

use crate::{
    infrastructure::dto::http::ErrorResponse,
    usecase::{PlaceError, StateError},
};

/// Error returned by the HTTP handlers
///
/// The `Display` text becomes the `message` field of the error body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Place(#[from] PlaceError),

    #[error(transparent)]
    State(#[from] StateError),

    /// Body could not be parsed
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Place(error) => match error {
                PlaceError::InvalidCoordinates
                | PlaceError::InvalidColor
                | PlaceError::ColorNotAllowed => StatusCode::BAD_REQUEST,
                PlaceError::Unauthorized => StatusCode::UNAUTHORIZED,
                PlaceError::Forbidden => StatusCode::FORBIDDEN,
                PlaceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                PlaceError::CanvasNotFound(_) => StatusCode::NOT_FOUND,
                PlaceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::State(StateError::CanvasNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::State(StateError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Place(error) => match error {
                PlaceError::InvalidCoordinates => "invalid_coordinates",
                PlaceError::InvalidColor => "invalid_color",
                PlaceError::ColorNotAllowed => "color_not_allowed",
                PlaceError::Unauthorized => "unauthorized",
                PlaceError::Forbidden => "forbidden",
                PlaceError::RateLimited { .. } => "rate_limited",
                PlaceError::CanvasNotFound(_) => "canvas_not_found",
                PlaceError::Store(_) => "store_error",
            },
            ApiError::State(StateError::CanvasNotFound(_)) => "canvas_not_found",
            ApiError::State(StateError::Store(_)) => "store_error",
            ApiError::BadRequest(_) => "invalid_request",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn retry_after_ms(&self) -> Option<i64> {
        match self {
            ApiError::Place(PlaceError::RateLimited { retry_after_ms }) => Some(*retry_after_ms),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", self.code(), self);
        }

        let retry_after_ms = self.retry_after_ms();
        let body = ErrorResponse {
            success: false,
            error: self.code().to_string(),
            message: self.to_string(),
            retry_after_ms,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(ms) = retry_after_ms {
            // Retry-After is whole seconds, rounded up
            let seconds = (ms.max(0) + 999) / 1000;
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}
