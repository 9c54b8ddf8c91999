use std::{fmt, sync::Arc};

use argus_core::{
    Alert, AlertEvent, CoreError, NewAlert, Result,
    database::{AlertRepository, CameraRepository},
};
use tracing::info;

use crate::infra::websocket::{BroadcastFanout, FanoutReport};

/// Outcome of one ingest: the persisted alert, the payload that was pushed,
/// and how the push went.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub alert: Alert,
    pub event: AlertEvent,
    pub notification: FanoutReport,
}

/// Persists worker-submitted alerts and pushes them to connected clients.
pub struct AlertIngest {
    cameras: Arc<dyn CameraRepository>,
    alerts: Arc<dyn AlertRepository>,
    fanout: BroadcastFanout,
}

impl fmt::Debug for AlertIngest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertIngest")
            .field("fanout", &self.fanout)
            .finish_non_exhaustive()
    }
}

impl AlertIngest {
    pub fn new(
        cameras: Arc<dyn CameraRepository>,
        alerts: Arc<dyn AlertRepository>,
        fanout: BroadcastFanout,
    ) -> Self {
        Self {
            cameras,
            alerts,
            fanout,
        }
    }

    /// The broadcast runs after the alert is stored and its outcome never
    /// fails the ingest.
    pub async fn ingest(&self, new_alert: NewAlert) -> Result<IngestReceipt> {
        new_alert.validate()?;

        let camera = self
            .cameras
            .get_camera(&new_alert.camera_id)
            .await?
            .ok_or_else(|| CoreError::camera_not_found(&new_alert.camera_id))?;

        let alert = self.alerts.create_alert(&new_alert).await?;
        let event = AlertEvent::from_record(&alert, Some(camera.summary()));
        let notification = self.fanout.broadcast_alert(event.clone());

        info!(
            alert_id = %alert.id,
            camera_id = %alert.camera_id,
            confidence = alert.confidence,
            delivered = notification.delivered,
            failed = notification.failed,
            "alert ingested"
        );

        Ok(IngestReceipt {
            alert,
            event,
            notification,
        })
    }
}
