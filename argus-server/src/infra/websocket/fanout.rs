use argus_core::{AlertEvent, Camera, CameraStatusPublisher, LifecyclePhase};
use tracing::{debug, error, warn};

use super::{
    connection::Outbound,
    messages::OutboundEvent,
    registry::ConnectionRegistry,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Pushes events to registered connections. Delivery is at-most-once and
/// never waits on a client.
#[derive(Debug, Clone)]
pub struct BroadcastFanout {
    registry: ConnectionRegistry,
}

impl BroadcastFanout {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Deliver to every open connection. Connections that cannot take the
    /// frame are removed; the rest still receive it.
    pub fn broadcast(&self, event: &OutboundEvent) -> FanoutReport {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(err) => {
                error!(kind = event.kind(), error = %err, "failed to serialize event");
                return FanoutReport::default();
            }
        };

        let mut report = FanoutReport::default();
        for connection in self.registry.snapshot() {
            match connection.deliver(Outbound::Text(frame.clone())) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(
                        session_id = connection.session_id(),
                        kind = event.kind(),
                        error = %err,
                        "delivery failed; dropping client"
                    );
                    self.registry.remove(connection.session_id());
                    report.failed += 1;
                }
            }
        }

        debug!(
            kind = event.kind(),
            delivered = report.delivered,
            failed = report.failed,
            "event broadcast"
        );
        report
    }

    /// Deliver to one connection. Returns `false` if it is absent or the
    /// frame could not be queued.
    pub fn unicast(&self, session_id: &str, event: &OutboundEvent) -> bool {
        let Some(connection) = self.registry.get(session_id) else {
            return false;
        };

        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(err) => {
                error!(kind = event.kind(), error = %err, "failed to serialize event");
                return false;
            }
        };

        match connection.deliver(Outbound::Text(frame)) {
            Ok(()) => true,
            Err(err) => {
                warn!(session_id, kind = event.kind(), error = %err, "unicast failed; dropping client");
                self.registry.remove(session_id);
                false
            }
        }
    }

    pub fn broadcast_alert(&self, alert: AlertEvent) -> FanoutReport {
        self.broadcast(&OutboundEvent::Alert { data: alert })
    }
}

impl CameraStatusPublisher for BroadcastFanout {
    fn camera_status_changed(&self, camera: &Camera, phase: LifecyclePhase) {
        self.broadcast(&OutboundEvent::camera_status(camera, phase));
    }
}
