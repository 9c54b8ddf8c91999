use std::{fmt, sync::Arc};

use argus_core::{
    CameraLifecycleCoordinator, DetectionWorker, IdentityVerifier, JwtIdentityVerifier,
    database::{AlertRepository, CameraRepository, InMemoryAlertRepository, InMemoryCameraRepository},
};

use crate::infra::{
    alert_ingest::AlertIngest,
    config::Config,
    websocket::{BroadcastFanout, ConnectionRegistry, HeartbeatMonitor},
};

/// Camera and alert stores backing the server.
#[derive(Clone)]
pub struct Stores {
    pub cameras: Arc<dyn CameraRepository>,
    pub alerts: Arc<dyn AlertRepository>,
}

impl fmt::Debug for Stores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

impl Stores {
    pub fn new(cameras: Arc<dyn CameraRepository>, alerts: Arc<dyn AlertRepository>) -> Self {
        Self { cameras, alerts }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryCameraRepository::new()),
            Arc::new(InMemoryAlertRepository::new()),
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: ConnectionRegistry,
    pub fanout: BroadcastFanout,
    pub identity: Arc<dyn IdentityVerifier>,
    pub lifecycle: Arc<CameraLifecycleCoordinator>,
    pub alert_ingest: Arc<AlertIngest>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the realtime and lifecycle components over the given stores,
    /// verifying credentials with the configured JWT secret.
    pub fn new(config: Arc<Config>, stores: Stores, worker: Arc<dyn DetectionWorker>) -> Self {
        let identity = Arc::new(JwtIdentityVerifier::new(&config.auth.jwt_secret));
        Self::with_identity(config, stores, worker, identity)
    }

    pub fn with_identity(
        config: Arc<Config>,
        stores: Stores,
        worker: Arc<dyn DetectionWorker>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let registry = ConnectionRegistry::with_outbound_buffer(config.realtime.outbound_buffer);
        let fanout = BroadcastFanout::new(registry.clone());

        let lifecycle = Arc::new(
            CameraLifecycleCoordinator::new(
                Arc::clone(&stores.cameras),
                worker,
                config.worker.timeout,
            )
            .with_status_publisher(Arc::new(fanout.clone())),
        );

        let alert_ingest = Arc::new(AlertIngest::new(
            Arc::clone(&stores.cameras),
            Arc::clone(&stores.alerts),
            fanout.clone(),
        ));

        Self {
            config,
            registry,
            fanout,
            identity,
            lifecycle,
            alert_ingest,
        }
    }

    pub fn heartbeat_monitor(&self) -> HeartbeatMonitor {
        HeartbeatMonitor::new(self.registry.clone(), self.config.realtime.heartbeat_interval)
    }
}
