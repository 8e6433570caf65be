//! HTTP API client: pixel placement and canvas state reads.

use std::time::Duration;

use pixelwall_server::infrastructure::dto::http::{
    CanvasStateDto, ErrorResponse, PlacePixelRequest,
};

use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Every request fails with [`ClientError::Http`] once `timeout` elapses.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// `POST /api/canvas/{canvasId}/place`
    pub async fn place(
        &self,
        canvas_id: &str,
        request: &PlacePixelRequest,
    ) -> Result<(), ClientError> {
        let url = format!("{}/api/canvas/{}/place", self.base_url, canvas_id);
        let response = self.http.post(url).json(request).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(rejection(status.as_u16(), &body))
    }

    /// `GET /api/canvas/{canvasId}`
    pub async fn fetch_state(&self, canvas_id: &str) -> Result<CanvasStateDto, ClientError> {
        let url = format!("{}/api/canvas/{}", self.base_url, canvas_id);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http(format!(
                "GET canvas '{}' returned {}: {}",
                canvas_id, status, body
            )));
        }
        Ok(response.json().await?)
    }
}

/// Turn a non-2xx placement response into a typed rejection.
fn rejection(status: u16, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(error) => ClientError::Placement {
            status,
            code: error.error,
            message: error.message,
            retry_after_ms: error.retry_after_ms,
        },
        Err(_) => ClientError::Placement {
            status,
            code: "unknown".to_string(),
            message: body.to_string(),
            retry_after_ms: None,
        },
    }
}
