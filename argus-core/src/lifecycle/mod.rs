//! Camera lifecycle coordination.
//!
//! Drives cameras through `Stopped -> Starting -> Streaming` and
//! `Streaming -> Stopping -> Stopped` against the detection worker. A start
//! the worker does not confirm is rolled back to `Stopped`; a stop is
//! persisted first and the worker acknowledgement is best effort.
//!
//! At most one operation runs per camera id; a concurrent request for the
//! same camera fails fast with [`LifecycleError::CameraBusy`]. Each
//! transition runs on its own task, so a caller that goes away mid-flight
//! never leaves a camera between its persisted write and the worker outcome.

mod in_flight;

use std::{fmt, future::Future, sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    camera::{Camera, CameraPatch, InvalidTransition, LifecyclePhase, LifecycleTransition},
    database::CameraRepository,
    error::CoreError,
    worker::{DetectionWorker, WorkerCommand, WorkerError, WorkerFailureReason},
};
use in_flight::{InFlightGuard, InFlightTable};

/// Default bound on a single worker command.
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures surfaced by [`CameraLifecycleCoordinator`].
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No camera with this id.
    #[error("Camera {0} not found")]
    NotFound(String),

    /// Another start or stop for this camera is still running.
    #[error("Camera {0} already has a lifecycle operation in flight")]
    CameraBusy(String),

    /// The worker did not confirm a start; the streaming flag was rolled back.
    #[error("Failed to start camera {camera_id}: {source}")]
    WorkerStartFailed {
        /// Camera that failed to start.
        camera_id: String,
        /// How the worker failed.
        #[source]
        source: WorkerError,
    },

    /// The requested step is not valid from the camera's current phase.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// The camera store failed.
    #[error("Camera store error: {0}")]
    Store(CoreError),

    /// The transition task panicked or was torn down with the runtime.
    #[error("Lifecycle task for camera {camera_id} did not complete: {message}")]
    Interrupted {
        /// Camera whose transition was interrupted.
        camera_id: String,
        /// Join failure reported by the runtime.
        message: String,
    },
}

impl LifecycleError {
    /// Worker failure class, for start failures only.
    pub fn worker_failure(&self) -> Option<WorkerFailureReason> {
        match self {
            Self::WorkerStartFailed { source, .. } => Some(source.reason()),
            _ => None,
        }
    }
}

/// Receives the outcome of every lifecycle step. Must not block.
pub trait CameraStatusPublisher: Send + Sync {
    /// Called after each persisted step with the camera as stored.
    fn camera_status_changed(&self, camera: &Camera, phase: LifecyclePhase);
}

/// Collaborators a transition task owns for its whole run.
#[derive(Clone)]
struct LifecyclePorts {
    cameras: Arc<dyn CameraRepository>,
    worker: Arc<dyn DetectionWorker>,
    worker_timeout: Duration,
    publisher: Option<Arc<dyn CameraStatusPublisher>>,
}

/// Coordinates camera start/stop against the detection worker.
pub struct CameraLifecycleCoordinator {
    ports: LifecyclePorts,
    in_flight: InFlightTable,
}

impl fmt::Debug for CameraLifecycleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraLifecycleCoordinator")
            .field("worker_timeout", &self.ports.worker_timeout)
            .field("in_flight", &self.in_flight.len())
            .field("has_publisher", &self.ports.publisher.is_some())
            .finish()
    }
}

impl CameraLifecycleCoordinator {
    /// Coordinator bounding every worker command by `worker_timeout`.
    pub fn new(
        cameras: Arc<dyn CameraRepository>,
        worker: Arc<dyn DetectionWorker>,
        worker_timeout: Duration,
    ) -> Self {
        Self {
            ports: LifecyclePorts {
                cameras,
                worker,
                worker_timeout,
                publisher: None,
            },
            in_flight: InFlightTable::default(),
        }
    }

    /// Report every lifecycle step to `publisher`.
    pub fn with_status_publisher(mut self, publisher: Arc<dyn CameraStatusPublisher>) -> Self {
        self.ports.publisher = Some(publisher);
        self
    }

    /// Start streaming. Returns the camera in its persisted streaming state,
    /// or rolls `is_streaming` back and fails if the worker does not confirm.
    ///
    /// A camera already marked streaming gets the start re-issued; the worker
    /// is idempotent per camera.
    pub async fn start(&self, camera_id: &str) -> Result<Camera, LifecycleError> {
        let slot = self.acquire(camera_id, LifecyclePhase::Starting)?;
        let ports = self.ports.clone();
        let id = camera_id.to_string();
        run_detached(camera_id, async move { ports.start(&id, slot).await }).await
    }

    /// Stop streaming. The persisted state is authoritative: a worker that
    /// fails to acknowledge is logged and the camera still ends stopped.
    pub async fn stop(&self, camera_id: &str) -> Result<Camera, LifecycleError> {
        let slot = self.acquire(camera_id, LifecyclePhase::Stopping)?;
        let ports = self.ports.clone();
        let id = camera_id.to_string();
        run_detached(camera_id, async move { ports.stop(&id, slot).await }).await
    }

    /// Current phase: the in-flight phase while an operation runs, otherwise
    /// the phase implied by the persisted record.
    pub async fn phase(&self, camera_id: &str) -> Result<LifecyclePhase, LifecycleError> {
        self.status(camera_id).await.map(|(_, phase)| phase)
    }

    /// Persisted camera together with its current phase.
    pub async fn status(&self, camera_id: &str) -> Result<(Camera, LifecyclePhase), LifecycleError> {
        let camera = self.ports.load(camera_id).await?;
        let phase = self
            .in_flight
            .phase(camera_id)
            .unwrap_or_else(|| camera.resting_phase());
        Ok((camera, phase))
    }

    /// Number of cameras with an operation running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    fn acquire(&self, camera_id: &str, phase: LifecyclePhase) -> Result<InFlightGuard, LifecycleError> {
        self.in_flight
            .try_acquire(camera_id, phase)
            .ok_or_else(|| LifecycleError::CameraBusy(camera_id.to_string()))
    }
}

/// Run a transition on its own task. Dropping the caller detaches the task
/// instead of aborting it; the in-flight slot moves with the transition.
async fn run_detached<F>(camera_id: &str, transition: F) -> Result<Camera, LifecycleError>
where
    F: Future<Output = Result<Camera, LifecycleError>> + Send + 'static,
{
    tokio::spawn(transition).await.unwrap_or_else(|err| {
        error!(camera_id, error = %err, "lifecycle task failed");
        Err(LifecycleError::Interrupted {
            camera_id: camera_id.to_string(),
            message: err.to_string(),
        })
    })
}

impl LifecyclePorts {
    async fn start(&self, camera_id: &str, slot: InFlightGuard) -> Result<Camera, LifecycleError> {
        let camera = self.load(camera_id).await?;
        let phase = camera
            .resting_phase()
            .apply(LifecycleTransition::BeginStart)?;
        let pending = if camera.is_streaming {
            debug!(camera_id, "camera already streaming; re-issuing start");
            camera
        } else {
            self.persist(camera_id, CameraPatch::streaming(true)).await?
        };
        self.publish(&pending, phase);

        match self.call_worker(WorkerCommand::Start, camera_id).await {
            Ok(()) => {
                let phase = phase.apply(LifecycleTransition::ConfirmStart)?;
                slot.set_phase(phase);
                info!(camera_id, "camera streaming");
                self.publish(&pending, phase);
                Ok(pending)
            }
            Err(err) => {
                let phase = phase.apply(LifecycleTransition::RollbackStart)?;
                slot.set_phase(phase);
                warn!(
                    camera_id,
                    reason = %err.reason(),
                    error = %err,
                    "worker did not confirm start; rolling back"
                );

                match self.persist(camera_id, CameraPatch::streaming(false)).await {
                    Ok(rolled_back) => self.publish(&rolled_back, phase),
                    Err(rollback_err) => error!(
                        camera_id,
                        error = %rollback_err,
                        "failed to roll back streaming flag"
                    ),
                }

                Err(LifecycleError::WorkerStartFailed {
                    camera_id: camera_id.to_string(),
                    source: err,
                })
            }
        }
    }

    async fn stop(&self, camera_id: &str, slot: InFlightGuard) -> Result<Camera, LifecycleError> {
        let camera = self.load(camera_id).await?;
        let phase = camera
            .resting_phase()
            .apply(LifecycleTransition::BeginStop)?;
        let stopped = self.persist(camera_id, CameraPatch::streaming(false)).await?;
        self.publish(&stopped, phase);

        if let Err(err) = self.call_worker(WorkerCommand::Stop, camera_id).await {
            warn!(
                camera_id,
                reason = %err.reason(),
                error = %err,
                "worker did not acknowledge stop; camera stays stopped"
            );
        }

        let phase = phase.apply(LifecycleTransition::FinishStop)?;
        slot.set_phase(phase);
        info!(camera_id, "camera stopped");
        self.publish(&stopped, phase);
        Ok(stopped)
    }

    async fn call_worker(&self, command: WorkerCommand, camera_id: &str) -> Result<(), WorkerError> {
        tokio::time::timeout(self.worker_timeout, self.worker.send(command, camera_id))
            .await
            .unwrap_or(Err(WorkerError::Timeout(self.worker_timeout)))
    }

    async fn load(&self, camera_id: &str) -> Result<Camera, LifecycleError> {
        self.cameras
            .get_camera(camera_id)
            .await
            .map_err(|err| store_error(camera_id, err))?
            .ok_or_else(|| LifecycleError::NotFound(camera_id.to_string()))
    }

    async fn persist(&self, camera_id: &str, patch: CameraPatch) -> Result<Camera, LifecycleError> {
        self.cameras
            .update_camera(camera_id, &patch)
            .await
            .map_err(|err| store_error(camera_id, err))
    }

    fn publish(&self, camera: &Camera, phase: LifecyclePhase) {
        if let Some(publisher) = &self.publisher {
            publisher.camera_status_changed(camera, phase);
        }
    }
}

fn store_error(camera_id: &str, err: CoreError) -> LifecycleError {
    if err.is_not_found() {
        LifecycleError::NotFound(camera_id.to_string())
    } else {
        LifecycleError::Store(err)
    }
}
