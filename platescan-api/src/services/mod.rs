//! Pipeline services and external oracle clients

pub mod chat_pipeline;
pub mod detection_logger;
pub mod detection_pipeline;
pub mod detector_client;
pub mod llm_client;
pub mod ocr_client;
pub mod plate_normalizer;
pub mod retry;

pub use chat_pipeline::{ChatError, ChatOutcome, ChatPipeline, ChatTurn};
pub use detection_pipeline::{DetectionError, DetectionOutcome, DetectionOptions, DetectionPipeline};
pub use detector_client::{BoundingBox, HostedDetectorClient, PlateDetector};
pub use llm_client::{ChatCompletionsClient, LanguageModel};
pub use ocr_client::{LayoutOcrClient, TextRecognizer};
pub use retry::RetryPolicy;
