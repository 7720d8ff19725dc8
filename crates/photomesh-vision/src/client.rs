use std::time::Duration;

use anyhow::Context;
use photomesh_core::models::ImageAnalysis;
use thiserror::Error;

/// Analysis subsystem failures. All of these are non-fatal to an upload.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Analysis request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to reach analysis service: {0}")]
    Connection(String),

    #[error("Analysis service returned HTTP {status}: {body}")]
    ErrorResponse { status: u16, body: String },

    #[error("Malformed analysis response: {0}")]
    Decode(String),
}

/// Client for the external vision service.
///
/// Applies a bounded timeout to every call and retries exactly once on
/// transient connect failures. Timeouts are never retried (an overloaded
/// service gets no extra load from us), and a well-formed error response from
/// the service is taken at face value.
#[derive(Clone)]
pub struct VisionClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    api_key: Option<String>,
}

impl VisionClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for vision service")?;

        Ok(VisionClient {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            api_key,
        })
    }

    /// Analyze raw image bytes, returning whatever subset of capabilities the
    /// current deployment supports.
    pub async fn analyze(&self, image_data: Vec<u8>) -> Result<ImageAnalysis, VisionError> {
        let started = std::time::Instant::now();

        let response = match self.send_analyze(image_data.clone()).await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return Err(VisionError::Timeout(self.timeout));
            }
            Err(err) if err.is_connect() => {
                // One retry on transient connection failures (refused/reset).
                tracing::debug!(error = %err, "Vision connect failed, retrying once");
                self.send_analyze(image_data).await.map_err(|retry_err| {
                    if retry_err.is_timeout() {
                        VisionError::Timeout(self.timeout)
                    } else {
                        VisionError::Connection(retry_err.to_string())
                    }
                })?
            }
            Err(err) => return Err(VisionError::Connection(err.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(VisionError::ErrorResponse {
                status: status.as_u16(),
                body,
            });
        }

        let analysis: ImageAnalysis = response
            .json()
            .await
            .map_err(|e| VisionError::Decode(e.to_string()))?;

        tracing::info!(
            objects = analysis.objects.len(),
            faces = analysis.faces.len(),
            text_fragments = analysis.text.len(),
            colors = analysis.colors.len(),
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Vision analysis completed"
        );

        Ok(analysis)
    }

    /// Best-effort reachability probe against the service's health endpoint.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http_client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn send_analyze(&self, image_data: Vec<u8>) -> Result<reqwest::Response, reqwest::Error> {
        let url = format!("{}/analyze/complete", self.base_url);
        let mut request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/octet-stream")
            .body(image_data);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request.send().await
    }
}
