//! Detection pipeline orchestrator
//!
//! Coordinates the detection request through its states:
//! resize → detect (with retry) → crop → recognize (with retry) →
//! normalize → enrich. Stages are strictly sequential; the only blocking
//! operations are the oracle calls. Retries cover transport/availability
//! failures only — an empty box list or empty OCR text is a terminal
//! outcome, never a retry trigger.

use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::db::{query_spec::QuerySpec, Registry, RegistryError, Row};
use crate::services::detection_logger::DetectionLogger;
use crate::services::detector_client::{DetectorError, PlateDetector};
use crate::services::ocr_client::{OcrError, TextRecognizer};
use crate::services::plate_normalizer;
use crate::services::retry::{RetryError, RetryPolicy};

/// Side length of the square detection frame. The input is resized to this
/// before detection; it fixes the coordinate space of the returned boxes.
pub const DETECTION_FRAME_SIZE: u32 = 640;

/// Terminal pipeline errors, each with a stable wire kind
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Uploaded image could not be decoded: {0}")]
    InvalidImage(String),

    #[error("No plates detected")]
    NoPlatesDetected,

    #[error("Plate detection failed after retries: {0}")]
    PredictionFailed(DetectorError),

    #[error("Detected box collapsed to an empty rectangle")]
    DegenerateBox,

    #[error("OCR failed after retries: {0}")]
    OcrFailed(OcrError),

    #[error("No OCR text")]
    NoOcrText,

    #[error("Registry lookup failed: {0}")]
    RegistryUnavailable(RegistryError),

    #[error("Request cancelled")]
    Cancelled,
}

impl DetectionError {
    /// Stable error kind carried in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidImage(_) => "invalid_image",
            Self::NoPlatesDetected => "no_plates_detected",
            Self::PredictionFailed(_) => "prediction_failed",
            Self::DegenerateBox => "degenerate_box",
            Self::OcrFailed(_) => "ocr_failed",
            Self::NoOcrText => "no_ocr_text",
            Self::RegistryUnavailable(_) => "registry_unavailable",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Successful pipeline output
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub plate_number: String,
    /// First matching registry row, if any (absence is not an error)
    pub driver_info: Option<Row>,
    /// Public URL of the stored crop; null when best-effort persistence failed
    pub image_url: Option<String>,
}

/// Tunable pipeline parameters
#[derive(Debug, Clone)]
pub struct DetectionOptions {
    pub confidence_threshold: f32,
    pub overlap_threshold: f32,
    pub detector_retry: RetryPolicy,
    pub ocr_retry: RetryPolicy,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            overlap_threshold: 0.3,
            detector_retry: RetryPolicy::new(3, Duration::from_secs(5)),
            ocr_retry: RetryPolicy::new(3, Duration::from_secs(5)),
        }
    }
}

/// Detection request orchestrator
pub struct DetectionPipeline {
    detector: Arc<dyn PlateDetector>,
    recognizer: Arc<dyn TextRecognizer>,
    registry: Arc<dyn Registry>,
    logger: DetectionLogger,
    options: DetectionOptions,
}

impl DetectionPipeline {
    pub fn new(
        detector: Arc<dyn PlateDetector>,
        recognizer: Arc<dyn TextRecognizer>,
        registry: Arc<dyn Registry>,
        storage_bucket: impl Into<String>,
        options: DetectionOptions,
    ) -> Self {
        let logger = DetectionLogger::new(Arc::clone(&registry), storage_bucket);
        Self {
            detector,
            recognizer,
            registry,
            logger,
            options,
        }
    }

    /// Run one uploaded image through the full pipeline.
    pub async fn run(
        &self,
        image_bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<DetectionOutcome, DetectionError> {
        // Resize to the fixed detection frame before any box math
        let decoded = image::load_from_memory(image_bytes)
            .map_err(|e| DetectionError::InvalidImage(e.to_string()))?;
        let frame = DynamicImage::ImageRgb8(decoded.to_rgb8()).resize_exact(
            DETECTION_FRAME_SIZE,
            DETECTION_FRAME_SIZE,
            image::imageops::FilterType::Triangle,
        );
        let frame_jpeg = encode_jpeg(&frame)?;

        // Detect, retrying transport failures with a fixed delay
        let boxes = self
            .options
            .detector_retry
            .run("plate detection", cancel, || {
                self.detector.detect(
                    &frame_jpeg,
                    self.options.confidence_threshold,
                    self.options.overlap_threshold,
                )
            })
            .await
            .map_err(|e| match e {
                RetryError::Exhausted(err) => DetectionError::PredictionFailed(err),
                RetryError::Cancelled => DetectionError::Cancelled,
            })?;

        // First box is primary; the detector's own ranking is trusted and
        // no confidence re-ranking happens here
        let Some(primary) = boxes.first() else {
            tracing::info!("Detector returned no boxes");
            return Err(DetectionError::NoPlatesDetected);
        };

        let rect = primary.corner_rect().ok_or(DetectionError::DegenerateBox)?;

        // Clamp to the frame; a box may extend past the edge
        let frame_max = DETECTION_FRAME_SIZE as i64;
        let left = rect.left.clamp(0, frame_max);
        let top = rect.top.clamp(0, frame_max);
        let right = rect.right.clamp(0, frame_max);
        let bottom = rect.bottom.clamp(0, frame_max);
        if right <= left || bottom <= top {
            return Err(DetectionError::DegenerateBox);
        }

        tracing::debug!(
            left,
            top,
            right,
            bottom,
            confidence = primary.confidence,
            "Cropping primary box"
        );

        let crop = frame.crop_imm(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        );
        let crop_jpeg = encode_jpeg(&crop)?;

        // Recognize, with an independently parameterized retry budget
        let regions = self
            .options
            .ocr_retry
            .run("plate OCR", cancel, || self.recognizer.recognize(&crop_jpeg))
            .await
            .map_err(|e| match e {
                RetryError::Exhausted(err) => DetectionError::OcrFailed(err),
                RetryError::Cancelled => DetectionError::Cancelled,
            })?;

        // First layout region's markdown text; content absence is terminal
        let raw_text = regions
            .first()
            .map(|r| r.markdown.text.clone())
            .unwrap_or_default();
        if raw_text.trim().is_empty() {
            return Err(DetectionError::NoOcrText);
        }

        let plate_number =
            plate_normalizer::normalize(&raw_text).ok_or(DetectionError::NoOcrText)?;

        tracing::info!(plate_number = %plate_number, "Plate normalized");

        // Enrich: registry lookup (absence → null), then best-effort audit
        let driver_info = self.lookup_driver(&plate_number).await?;
        let image_url = self.logger.record(&plate_number, crop_jpeg).await;

        Ok(DetectionOutcome {
            plate_number,
            driver_info,
            image_url,
        })
    }

    /// First matching registry row wins; no row is a null result, not an error.
    async fn lookup_driver(&self, plate_number: &str) -> Result<Option<Row>, DetectionError> {
        let rows = self
            .registry
            .select(&QuerySpec::plate_lookup(plate_number))
            .await
            .map_err(DetectionError::RegistryUnavailable)?;
        Ok(rows.into_iter().next())
    }
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, DetectionError> {
    let mut buffer = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut buffer),
        image::ImageFormat::Jpeg,
    )
    .map_err(|e| DetectionError::InvalidImage(e.to_string()))?;
    Ok(buffer)
}
