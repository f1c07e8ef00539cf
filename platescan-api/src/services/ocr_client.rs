//! Layout-parsing OCR oracle client
//!
//! Synchronous POST of a base64 JPEG with fixed feature flags; the plate
//! crop is pre-oriented and small, so document-orientation classification,
//! unwarping and chart recognition are all disabled. Token authenticated.
//! One remote call per invocation; the pipeline owns retries, and both
//! non-2xx responses and timeouts consume retry attempts there.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// OCR client errors. All variants are retryable by the orchestrator.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// One layout-parsing result region
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutRegion {
    pub markdown: MarkdownBlock,
}

/// Markdown rendering of a recognized region
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarkdownBlock {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct OcrEnvelope {
    result: OcrResult,
}

#[derive(Debug, Deserialize)]
struct OcrResult {
    #[serde(rename = "layoutParsingResults", default)]
    layout_parsing_results: Vec<LayoutRegion>,
}

/// Text-recognition oracle contract. Returns the layout results in the
/// oracle's own order; the first region is the one the pipeline reads.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, jpeg: &[u8]) -> Result<Vec<LayoutRegion>, OcrError>;
}

/// HTTP client for the layout-parsing endpoint
pub struct LayoutOcrClient {
    http_client: reqwest::Client,
    endpoint_url: String,
    token: String,
    request_timeout: Duration,
}

impl LayoutOcrClient {
    pub fn new(
        endpoint_url: impl Into<String>,
        token: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, OcrError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| OcrError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint_url: endpoint_url.into(),
            token: token.into(),
            request_timeout,
        })
    }
}

#[async_trait]
impl TextRecognizer for LayoutOcrClient {
    async fn recognize(&self, jpeg: &[u8]) -> Result<Vec<LayoutRegion>, OcrError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg);

        let payload = json!({
            "file": encoded,
            "fileType": 1,
            "useDocOrientationClassify": false,
            "useDocUnwarping": false,
            "useChartRecognition": false,
        });

        tracing::debug!(bytes = jpeg.len(), "Querying OCR oracle");

        let response = self
            .http_client
            .post(&self.endpoint_url)
            .timeout(self.request_timeout)
            .header("Authorization", format!("token {}", self.token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OcrError::Timeout
                } else {
                    OcrError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OcrError::Api(status.as_u16(), error_text));
        }

        let envelope: OcrEnvelope = response
            .json()
            .await
            .map_err(|e| OcrError::Parse(e.to_string()))?;

        tracing::info!(
            regions = envelope.result.layout_parsing_results.len(),
            "OCR oracle responded"
        );

        Ok(envelope.result.layout_parsing_results)
    }
}
