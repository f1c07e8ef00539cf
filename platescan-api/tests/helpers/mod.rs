//! Shared test helpers: fake oracles and app construction
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use platescan_api::db::query_spec::QuerySpec;
use platescan_api::db::{Registry, RegistryError, Row};
use platescan_api::services::detector_client::{BoundingBox, DetectorError, PlateDetector};
use platescan_api::services::llm_client::{LanguageModel, LlmError};
use platescan_api::services::ocr_client::{LayoutRegion, MarkdownBlock, OcrError, TextRecognizer};
use platescan_api::services::{ChatPipeline, DetectionOptions, DetectionPipeline, RetryPolicy};
use platescan_api::AppState;

/// A small valid JPEG for upload tests
pub fn test_jpeg() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(64, 48, image::Rgb([120, 30, 30]));
    let mut buffer = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut buffer),
            image::ImageFormat::Jpeg,
        )
        .expect("encode test jpeg");
    buffer
}

/// The bounding box from the canonical crop scenario
pub fn centered_box() -> BoundingBox {
    BoundingBox {
        x: 320.0,
        y: 320.0,
        width: 200.0,
        height: 80.0,
        confidence: 0.9,
    }
}

/// Scripted plate detector: fails `failures_before_success` times with a
/// transport error, then returns `boxes`
pub struct FakeDetector {
    pub boxes: Vec<BoundingBox>,
    pub failures_before_success: u32,
    pub calls: AtomicU32,
}

impl FakeDetector {
    pub fn returning(boxes: Vec<BoundingBox>) -> Self {
        Self {
            boxes,
            failures_before_success: 0,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing_first(failures: u32, boxes: Vec<BoundingBox>) -> Self {
        Self {
            boxes,
            failures_before_success: failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self {
            boxes: Vec::new(),
            failures_before_success: u32::MAX,
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlateDetector for FakeDetector {
    async fn detect(
        &self,
        _jpeg: &[u8],
        _confidence: f32,
        _overlap: f32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures_before_success {
            Err(DetectorError::Network("detector down".to_string()))
        } else {
            Ok(self.boxes.clone())
        }
    }
}

/// Scripted OCR oracle, same shape as [`FakeDetector`]
pub struct FakeRecognizer {
    pub regions: Vec<LayoutRegion>,
    pub failures_before_success: u32,
    pub calls: AtomicU32,
}

impl FakeRecognizer {
    pub fn reading(text: &str) -> Self {
        Self {
            regions: vec![LayoutRegion {
                markdown: MarkdownBlock {
                    text: text.to_string(),
                },
            }],
            failures_before_success: 0,
            calls: AtomicU32::new(0),
        }
    }

    pub fn returning(regions: Vec<LayoutRegion>) -> Self {
        Self {
            regions,
            failures_before_success: 0,
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self {
            regions: Vec::new(),
            failures_before_success: u32::MAX,
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextRecognizer for FakeRecognizer {
    async fn recognize(&self, _jpeg: &[u8]) -> Result<Vec<LayoutRegion>, OcrError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures_before_success {
            Err(OcrError::Timeout)
        } else {
            Ok(self.regions.clone())
        }
    }
}

/// In-memory registry capturing every interaction
pub struct FakeRegistry {
    pub rows: Vec<Row>,
    pub fail_selects: bool,
    pub fail_uploads: bool,
    pub selects: Mutex<Vec<QuerySpec>>,
    pub inserts: Mutex<Vec<(String, Value)>>,
    pub uploads: Mutex<Vec<(String, String)>>,
}

impl FakeRegistry {
    pub fn empty() -> Self {
        Self::with_rows(Vec::new())
    }

    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            fail_selects: false,
            fail_uploads: false,
            selects: Mutex::new(Vec::new()),
            inserts: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn driver_row() -> Row {
        json!({
            "plate_number": "125تونس8365",
            "driver_name": "Sami Ben Salah",
            "vehicle_make": "Ford"
        })
        .as_object()
        .unwrap()
        .clone()
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn select(&self, query: &QuerySpec) -> Result<Vec<Row>, RegistryError> {
        self.selects.lock().await.push(query.clone());
        if self.fail_selects {
            return Err(RegistryError::Network("registry down".to_string()));
        }
        Ok(self.rows.clone())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<(), RegistryError> {
        self.inserts.lock().await.push((table.to_string(), row));
        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, RegistryError> {
        if self.fail_uploads {
            return Err(RegistryError::Api(500, "storage down".to_string()));
        }
        self.uploads
            .lock()
            .await
            .push((bucket.to_string(), path.to_string()));
        Ok(format!(
            "https://registry.test/storage/v1/object/public/{}/{}",
            bucket, path
        ))
    }
}

/// Scripted language model: pops one response per `complete` call
pub struct FakeLanguageModel {
    pub responses: Mutex<VecDeque<Result<String, LlmError>>>,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl FakeLanguageModel {
    pub fn scripted(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::scripted(vec![Ok(format!("ACTION: ANSWER\n{}", text))])
    }
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .await
            .push((system_prompt.to_string(), user_prompt.to_string()));
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Unavailable("script exhausted".to_string())))
    }
}

/// Retry policies matching production shape (3 attempts, 5s fixed delay);
/// tests run under a paused clock so the delays cost nothing
pub fn test_options() -> DetectionOptions {
    DetectionOptions {
        confidence_threshold: 0.3,
        overlap_threshold: 0.3,
        detector_retry: RetryPolicy::new(3, Duration::from_secs(5)),
        ocr_retry: RetryPolicy::new(3, Duration::from_secs(5)),
    }
}

pub fn make_detection_pipeline(
    detector: Arc<FakeDetector>,
    recognizer: Arc<FakeRecognizer>,
    registry: Arc<FakeRegistry>,
) -> DetectionPipeline {
    DetectionPipeline::new(
        detector,
        recognizer,
        registry,
        "plate-crops",
        test_options(),
    )
}

/// Full test app with fake oracles behind the real router
pub fn make_test_app(
    detector: Arc<FakeDetector>,
    recognizer: Arc<FakeRecognizer>,
    registry: Arc<FakeRegistry>,
    llm: Arc<FakeLanguageModel>,
) -> axum::Router {
    let detection = make_detection_pipeline(detector, recognizer, Arc::clone(&registry));
    let chat = ChatPipeline::new(llm, registry);
    platescan_api::build_router(AppState::new(detection, chat))
}

/// Encode a single-file multipart body for the detect endpoint
pub fn multipart_image_body(boundary: &str, jpeg: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"plate.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
            boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(jpeg);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
