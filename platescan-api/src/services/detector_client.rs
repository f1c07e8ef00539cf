//! Plate detection oracle client
//!
//! Hosted-inference object detector: base64 JPEG in, JSON list of
//! center-format bounding boxes out. The client performs exactly one remote
//! call per invocation; the detection pipeline owns retries.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Detector client errors. Every variant is transport/availability-class
/// and therefore retryable by the orchestrator.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Axis-aligned bounding box in center format, pixel units of the
/// resized detection frame
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
}

/// Corner rectangle derived from a bounding box, integer pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        (self.right - self.left) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top) as u32
    }
}

impl BoundingBox {
    /// Corner rectangle: center ± half-extent, truncated to integers.
    /// A rectangle that fails `right > left && bottom > top` after
    /// truncation is degenerate and yields `None`.
    pub fn corner_rect(&self) -> Option<CropRect> {
        let rect = CropRect {
            left: (self.x - self.width / 2.0) as i64,
            top: (self.y - self.height / 2.0) as i64,
            right: (self.x + self.width / 2.0) as i64,
            bottom: (self.y + self.height / 2.0) as i64,
        };
        if rect.right > rect.left && rect.bottom > rect.top {
            Some(rect)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    predictions: Vec<BoundingBox>,
}

/// Plate detection oracle contract.
///
/// Returns boxes in the detector's own ranking; the first element is the
/// primary candidate. An empty list is a successful call with no plates.
#[async_trait]
pub trait PlateDetector: Send + Sync {
    async fn detect(
        &self,
        jpeg: &[u8],
        confidence_threshold: f32,
        overlap_threshold: f32,
    ) -> Result<Vec<BoundingBox>, DetectorError>;
}

/// HTTP client for the hosted detection endpoint
pub struct HostedDetectorClient {
    http_client: reqwest::Client,
    endpoint_url: String,
    api_key: String,
}

impl HostedDetectorClient {
    pub fn new(
        endpoint_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, DetectorError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DetectorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint_url: endpoint_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl PlateDetector for HostedDetectorClient {
    async fn detect(
        &self,
        jpeg: &[u8],
        confidence_threshold: f32,
        overlap_threshold: f32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg);

        tracing::debug!(
            bytes = jpeg.len(),
            confidence = confidence_threshold,
            overlap = overlap_threshold,
            "Querying detection oracle"
        );

        let response = self
            .http_client
            .post(&self.endpoint_url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("confidence", &confidence_threshold.to_string()),
                ("overlap", &overlap_threshold.to_string()),
            ])
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(encoded)
            .send()
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DetectorError::Api(status.as_u16(), error_text));
        }

        let detect_response: DetectResponse = response
            .json()
            .await
            .map_err(|e| DetectorError::Parse(e.to_string()))?;

        tracing::info!(
            boxes = detect_response.predictions.len(),
            "Detection oracle responded"
        );

        Ok(detect_response.predictions)
    }
}
