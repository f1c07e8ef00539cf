//! Error types for platescan-api
//!
//! Taxonomy: transport/availability errors were already retried by the
//! pipelines and surface as gateway errors; content-absence surfaces as
//! not-found; validation as unprocessable. The response body always carries
//! a structured error with a stable kind, never a raw error chain.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{ChatError, DetectionError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Semantically invalid input (422)
    #[error("{message}")]
    Unprocessable { code: &'static str, message: String },

    /// An upstream oracle failed after retries (502)
    #[error("{message}")]
    BadGateway { code: &'static str, message: String },

    /// An upstream oracle is unreachable (503)
    #[error("{message}")]
    Unavailable { code: &'static str, message: String },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// platescan-common error
    #[error("Common error: {0}")]
    Common(#[from] platescan_common::Error),
}

impl ApiError {
    /// True for 5xx-class errors worth recording as the service's last error.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ApiError::BadGateway { .. }
                | ApiError::Unavailable { .. }
                | ApiError::Internal(_)
                | ApiError::Io(_)
                | ApiError::Other(_)
                | ApiError::Common(_)
        )
    }
}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        let code = err.kind();
        let message = err.to_string();
        match err {
            DetectionError::NoPlatesDetected | DetectionError::NoOcrText => {
                ApiError::NotFound { code, message }
            }
            DetectionError::InvalidImage(_) | DetectionError::DegenerateBox => {
                ApiError::Unprocessable { code, message }
            }
            DetectionError::PredictionFailed(_)
            | DetectionError::OcrFailed(_)
            | DetectionError::RegistryUnavailable(_) => ApiError::BadGateway { code, message },
            DetectionError::Cancelled => ApiError::Internal(message),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let message = err.to_string();
        match err {
            ChatError::PlannerUnavailable(_) => ApiError::Unavailable {
                code: "planner_unavailable",
                message,
            },
            ChatError::PlannerError(_, _) => ApiError::BadGateway {
                code: "planner_error",
                message,
            },
            ChatError::QueryRejected(_) => ApiError::Unprocessable {
                code: "query_rejected",
                message,
            },
            ChatError::Registry(_) => ApiError::BadGateway {
                code: "registry_unavailable",
                message,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unprocessable { code, message } => {
                (StatusCode::UNPROCESSABLE_ENTITY, code, message)
            }
            ApiError::BadGateway { code, message } => (StatusCode::BAD_GATEWAY, code, message),
            ApiError::Unavailable { code, message } => {
                (StatusCode::SERVICE_UNAVAILABLE, code, message)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "common_error",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::detector_client::DetectorError;
    use crate::services::ocr_client::OcrError;

    #[test]
    fn detection_errors_map_to_expected_classes() {
        assert!(matches!(
            ApiError::from(DetectionError::NoPlatesDetected),
            ApiError::NotFound { code: "no_plates_detected", .. }
        ));
        assert!(matches!(
            ApiError::from(DetectionError::NoOcrText),
            ApiError::NotFound { code: "no_ocr_text", .. }
        ));
        assert!(matches!(
            ApiError::from(DetectionError::PredictionFailed(DetectorError::Network("x".into()))),
            ApiError::BadGateway { code: "prediction_failed", .. }
        ));
        assert!(matches!(
            ApiError::from(DetectionError::OcrFailed(OcrError::Timeout)),
            ApiError::BadGateway { code: "ocr_failed", .. }
        ));
        assert!(matches!(
            ApiError::from(DetectionError::DegenerateBox),
            ApiError::Unprocessable { code: "degenerate_box", .. }
        ));
    }

    #[test]
    fn chat_errors_distinguish_unreachable_from_api_failure() {
        assert!(matches!(
            ApiError::from(ChatError::PlannerUnavailable("refused".into())),
            ApiError::Unavailable { code: "planner_unavailable", .. }
        ));
        assert!(matches!(
            ApiError::from(ChatError::PlannerError(500, "boom".into())),
            ApiError::BadGateway { code: "planner_error", .. }
        ));
    }
}
