//! platescan-api - License Plate Recognition Service
//!
//! Identifies a vehicle license plate from an uploaded photograph by
//! coordinating an external object detector and an external text-recognition
//! service, and answers natural-language questions about the vehicle
//! registry through a constrained language-model query bridge.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use platescan_api::services::{
    ChatCompletionsClient, ChatPipeline, DetectionOptions, DetectionPipeline,
    HostedDetectorClient, LayoutOcrClient, RetryPolicy,
};
use platescan_api::AppState;
use platescan_common::PlatescanConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting platescan-api (License Plate Recognition)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = config_path();
    let config = PlatescanConfig::load(&config_path)
        .with_context(|| format!("Loading configuration from {}", config_path.display()))?;
    config.validate()?;

    let detector = HostedDetectorClient::new(
        config.detector.endpoint_url.as_str(),
        config.detector.api_key.as_str(),
    )
    .context("Creating detector client")?;
    let recognizer = LayoutOcrClient::new(
        config.ocr.endpoint_url.as_str(),
        config.ocr.token.as_str(),
        Duration::from_secs(config.ocr.timeout_secs),
    )
    .context("Creating OCR client")?;
    let llm = ChatCompletionsClient::new(
        config.llm.endpoint_url.as_str(),
        config.llm.api_key.as_str(),
        config.llm.model.as_str(),
    )
    .context("Creating language-model client")?;
    let registry = platescan_api::db::HttpRegistry::new(
        config.registry.url.as_str(),
        config.registry.api_key.as_str(),
    )
    .context("Creating registry client")?;
    let registry = Arc::new(registry) as Arc<dyn platescan_api::db::Registry>;

    let options = DetectionOptions {
        confidence_threshold: config.detector.confidence_threshold,
        overlap_threshold: config.detector.overlap_threshold,
        detector_retry: RetryPolicy::new(
            config.detector.max_attempts,
            Duration::from_secs(config.detector.retry_delay_secs),
        ),
        ocr_retry: RetryPolicy::new(
            config.ocr.max_attempts,
            Duration::from_secs(config.ocr.retry_delay_secs),
        ),
    };

    let detection = DetectionPipeline::new(
        Arc::new(detector),
        Arc::new(recognizer),
        Arc::clone(&registry),
        config.registry.storage_bucket.as_str(),
        options,
    );
    let chat = ChatPipeline::new(Arc::new(llm), registry);

    let state = AppState::new(detection, chat);
    let shutdown = state.shutdown.clone();
    let app = platescan_api::build_router(state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Binding {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            info!("Shutdown signal received, cancelling in-flight pipelines");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// Config path: first CLI argument, then PLATESCAN_CONFIG, then the
/// conventional file next to the binary.
fn config_path() -> PathBuf {
    if let Some(arg) = std::env::args().nth(1) {
        return PathBuf::from(arg);
    }
    if let Ok(path) = std::env::var("PLATESCAN_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("platescan.toml")
}
