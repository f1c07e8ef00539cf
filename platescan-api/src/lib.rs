//! platescan-api library interface
//!
//! Exposes the application state, router construction, and the pipeline
//! services for integration testing with substitutable fake oracles.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::services::{ChatPipeline, DetectionPipeline};

/// Application state shared across handlers
///
/// Oracles are injected at construction (no module-level singletons), so
/// every pipeline runs the same against production clients or test fakes.
#[derive(Clone)]
pub struct AppState {
    /// Detection request orchestrator
    pub detection: Arc<DetectionPipeline>,
    /// Chat request orchestrator
    pub chat: Arc<ChatPipeline>,
    /// Service-wide shutdown token; each request derives a child token
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last server-class error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(detection: DetectionPipeline, chat: ChatPipeline) -> Self {
        Self {
            detection: Arc::new(detection),
            chat: Arc::new(chat),
            shutdown: CancellationToken::new(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Record a server-class error for the health endpoint.
    pub async fn record_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::detect_routes())
        .merge(api::chat_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
