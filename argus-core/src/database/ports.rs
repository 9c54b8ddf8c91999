//! Store traits the lifecycle coordinator and alert ingest depend on.

use async_trait::async_trait;

use crate::{
    Result,
    alert::{Alert, NewAlert},
    camera::{Camera, CameraPatch},
};

/// Camera records, keyed by camera id.
#[async_trait]
pub trait CameraRepository: Send + Sync {
    /// `Ok(None)` when no camera has this id.
    async fn get_camera(&self, id: &str) -> Result<Option<Camera>>;

    /// Apply `patch` and return the updated record, or `CoreError::NotFound`.
    async fn update_camera(&self, id: &str, patch: &CameraPatch) -> Result<Camera>;
}

/// Append-only alert history.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Persist a validated submission, assigning its id and timestamp.
    async fn create_alert(&self, alert: &NewAlert) -> Result<Alert>;
}
