//! Process-local stores used by tests and when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::ports::{AlertRepository, CameraRepository};
use crate::{
    Result,
    alert::{Alert, NewAlert},
    camera::{Camera, CameraPatch},
    error::CoreError,
};

/// Camera store behind a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct InMemoryCameraRepository {
    cameras: RwLock<HashMap<String, Camera>>,
}

impl InMemoryCameraRepository {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `cameras`, keyed by their ids.
    pub fn with_cameras(cameras: impl IntoIterator<Item = Camera>) -> Self {
        let repo = Self::new();
        for camera in cameras {
            repo.insert(camera);
        }
        repo
    }

    /// Insert or replace a camera.
    pub fn insert(&self, camera: Camera) {
        self.cameras.write().insert(camera.id.clone(), camera);
    }

    /// Number of stored cameras.
    pub fn len(&self) -> usize {
        self.cameras.read().len()
    }

    /// Whether no cameras are stored.
    pub fn is_empty(&self) -> bool {
        self.cameras.read().is_empty()
    }
}

#[async_trait]
impl CameraRepository for InMemoryCameraRepository {
    async fn get_camera(&self, id: &str) -> Result<Option<Camera>> {
        Ok(self.cameras.read().get(id).cloned())
    }

    async fn update_camera(&self, id: &str, patch: &CameraPatch) -> Result<Camera> {
        let mut cameras = self.cameras.write();
        let camera = cameras
            .get_mut(id)
            .ok_or_else(|| CoreError::camera_not_found(id))?;
        camera.apply_patch(patch);
        Ok(camera.clone())
    }
}

/// Alert store that keeps every record in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryAlertRepository {
    alerts: RwLock<Vec<Alert>>,
}

impl InMemoryAlertRepository {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored alert, oldest first.
    pub fn all(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    /// Number of stored alerts.
    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    /// Whether no alerts are stored.
    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }
}

#[async_trait]
impl AlertRepository for InMemoryAlertRepository {
    async fn create_alert(&self, alert: &NewAlert) -> Result<Alert> {
        let record = Alert::from_new(alert.clone());
        self.alerts.write().push(record.clone());
        Ok(record)
    }
}
