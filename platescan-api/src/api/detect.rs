//! Detection endpoint
//!
//! POST /detect — one image file in a multipart form, detection outcome out.

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /detect response
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub plate_number: String,
    pub driver_info: Option<Value>,
    pub image_url: Option<String>,
}

/// POST /detect
///
/// Accepts a multipart form with an `image` field (the first file field is
/// used when none is named `image`). The upload lives only for the duration
/// of the request; only the derived crop is ever persisted.
pub async fn detect_plate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<DetectResponse>> {
    let mut image_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let is_image_field = field.name() == Some("image");
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        if is_image_field {
            image_bytes = Some(bytes.to_vec());
            break;
        }
        if image_bytes.is_none() && !bytes.is_empty() {
            image_bytes = Some(bytes.to_vec());
        }
    }

    let image_bytes = image_bytes
        .ok_or_else(|| ApiError::BadRequest("No image file in request".to_string()))?;

    tracing::info!(bytes = image_bytes.len(), "Detection request received");

    let cancel = state.shutdown.child_token();
    let outcome = match state.detection.run(&image_bytes, &cancel).await {
        Ok(outcome) => outcome,
        Err(err) => {
            let api_error = ApiError::from(err);
            if api_error.is_server_error() {
                state.record_error(api_error.to_string()).await;
            }
            return Err(api_error);
        }
    };

    tracing::info!(
        plate_number = %outcome.plate_number,
        driver_found = outcome.driver_info.is_some(),
        stored = outcome.image_url.is_some(),
        "Detection request completed"
    );

    Ok(Json(DetectResponse {
        plate_number: outcome.plate_number,
        driver_info: outcome.driver_info.map(Value::Object),
        image_url: outcome.image_url,
    }))
}

/// Build detection routes
pub fn detect_routes() -> Router<AppState> {
    Router::new().route("/detect", post(detect_plate))
}
