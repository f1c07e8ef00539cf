//! Best-effort detection persistence
//!
//! Stores the cropped plate image in the registry's object storage and
//! appends an audit row to `detection_logs`. This is a side channel: every
//! failure is caught and logged at WARN, and the primary detection request
//! proceeds regardless.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::Registry;

/// Audit-trail writer for completed detections
pub struct DetectionLogger {
    registry: Arc<dyn Registry>,
    bucket: String,
}

impl DetectionLogger {
    pub fn new(registry: Arc<dyn Registry>, bucket: impl Into<String>) -> Self {
        Self {
            registry,
            bucket: bucket.into(),
        }
    }

    /// Upload the crop and append the audit row. Returns the public URL of
    /// the stored crop, or `None` when the upload failed. An audit-row
    /// failure after a successful upload keeps the URL; the row is the
    /// part that was lost.
    pub async fn record(&self, plate_number: &str, crop_jpeg: Vec<u8>) -> Option<String> {
        let object_path = format!("{}.jpg", Uuid::new_v4());

        let image_url = match self
            .registry
            .upload_object(&self.bucket, &object_path, crop_jpeg, "image/jpeg")
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(
                    plate_number,
                    bucket = %self.bucket,
                    error = %e,
                    "Crop upload failed, continuing without image URL"
                );
                None
            }
        };

        let row = json!({
            "plate_number": plate_number,
            "image_url": image_url,
            "created_at": Utc::now().to_rfc3339(),
        });

        if let Err(e) = self.registry.insert("detection_logs", row).await {
            tracing::warn!(
                plate_number,
                error = %e,
                "Detection log insert failed, continuing"
            );
        }

        image_url
    }
}
