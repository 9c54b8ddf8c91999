//! Alert submissions from the detection worker and the events fanned out to
//! connected clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::camera::CameraSummary;
use crate::error::{CoreError, Result};

/// Detection region in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Extent to the right of `x`.
    pub width: f64,
    /// Extent below `y`.
    pub height: f64,
}

impl BoundingBox {
    /// Box from its top-left corner and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Fields submitted by the detection worker for a new alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    /// Camera that produced the detection.
    pub camera_id: String,
    /// Detector score in `[0, 1]`.
    pub confidence: f64,
    /// Where in the frame the detection sits.
    pub bounding_box: BoundingBox,
    /// Absolute URL of a stored snapshot, when the worker saved one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewAlert {
    /// Submission without a snapshot.
    pub fn new(camera_id: impl Into<String>, confidence: f64, bounding_box: BoundingBox) -> Self {
        Self {
            camera_id: camera_id.into(),
            confidence,
            bounding_box,
            image_url: None,
        }
    }

    /// Attach a snapshot URL.
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Reject blank camera ids, confidences outside `[0, 1]`, non-finite
    /// boxes and malformed snapshot URLs with [`CoreError::Validation`].
    pub fn validate(&self) -> Result<()> {
        if self.camera_id.trim().is_empty() {
            return Err(CoreError::Validation("cameraId must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(CoreError::Validation(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }
        if !self.bounding_box.is_finite() {
            return Err(CoreError::Validation(
                "boundingBox values must be finite numbers".into(),
            ));
        }
        if let Some(image_url) = &self.image_url {
            url::Url::parse(image_url).map_err(|err| {
                CoreError::Validation(format!("imageUrl is not a valid URL: {err}"))
            })?;
        }
        Ok(())
    }
}

/// Persisted alert record as returned by the alert store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Store-assigned id (UUIDv7).
    pub id: Uuid,
    /// Camera that produced the detection.
    pub camera_id: String,
    /// Detector score in `[0, 1]`.
    pub confidence: f64,
    /// Detection region.
    pub bounding_box: BoundingBox,
    /// Snapshot URL, if any.
    pub image_url: Option<String>,
    /// Set by the store on insert.
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Build a record the way the in-memory store persists one: fresh id,
    /// creation time of now.
    pub fn from_new(new: NewAlert) -> Self {
        Self {
            id: Uuid::now_v7(),
            camera_id: new.camera_id,
            confidence: new.confidence,
            bounding_box: new.bounding_box,
            image_url: new.image_url,
            created_at: Utc::now(),
        }
    }
}

/// Alert payload pushed to connected clients. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// Id of the persisted alert.
    pub id: Uuid,
    /// Camera that produced the detection.
    pub camera_id: String,
    /// Detector score in `[0, 1]`.
    pub confidence: f64,
    /// Detection region.
    pub bounding_box: BoundingBox,
    /// Snapshot URL, omitted when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Persisted creation time.
    pub created_at: DateTime<Utc>,
    /// Display fields of the source camera, omitted when the lookup failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraSummary>,
}

impl AlertEvent {
    /// Copy a persisted alert into a broadcast payload.
    pub fn from_record(alert: &Alert, camera: Option<CameraSummary>) -> Self {
        Self {
            id: alert.id,
            camera_id: alert.camera_id.clone(),
            confidence: alert.confidence,
            bounding_box: alert.bounding_box,
            image_url: alert.image_url.clone(),
            created_at: alert.created_at,
            camera,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewAlert {
        NewAlert::new("cam1", 0.95, BoundingBox::new(100.0, 50.0, 80.0, 100.0))
    }

    #[test]
    fn accepts_confidence_bounds() {
        for confidence in [0.0, 0.5, 1.0] {
            let mut alert = sample();
            alert.confidence = confidence;
            assert!(alert.validate().is_ok(), "confidence {confidence}");
        }
    }

    #[test]
    fn rejects_confidence_outside_unit_interval() {
        for confidence in [-0.01, 1.01, f64::NAN] {
            let mut alert = sample();
            alert.confidence = confidence;
            assert!(matches!(alert.validate(), Err(CoreError::Validation(_))));
        }
    }

    #[test]
    fn rejects_blank_camera_and_bad_image_url() {
        let mut alert = sample();
        alert.camera_id = "  ".into();
        assert!(alert.validate().is_err());

        let alert = sample().with_image_url("snapshot_1700000000.jpg");
        assert!(alert.validate().is_err());

        let alert = sample().with_image_url("https://cdn.example.com/snap.jpg");
        assert!(alert.validate().is_ok());
    }

    #[test]
    fn deserializes_worker_payload() {
        let payload = r#"{
            "cameraId": "cam1",
            "confidence": 0.95,
            "boundingBox": {"x": 100, "y": 50, "width": 80, "height": 100}
        }"#;
        let alert: NewAlert = serde_json::from_str(payload).unwrap();
        assert_eq!(alert, sample());
    }

    #[test]
    fn event_keeps_values_and_omits_absent_fields() {
        let record = Alert::from_new(sample());
        let event = AlertEvent::from_record(&record, None);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["cameraId"], "cam1");
        assert_eq!(json["confidence"], 0.95);
        assert_eq!(json["boundingBox"]["x"], 100.0);
        assert_eq!(json["boundingBox"]["height"], 100.0);
        assert!(json.get("imageUrl").is_none());
        assert!(json.get("camera").is_none());
    }
}
