//! Detection worker port.
//!
//! The worker is an out-of-process service doing capture and inference. It is
//! assumed idempotent per camera id.

mod http;

use std::{fmt, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use http::HttpDetectionWorker;

/// Command forwarded to the worker for one camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerCommand {
    /// Begin streaming.
    Start,
    /// End streaming.
    Stop,
}

impl WorkerCommand {
    /// Path segment used by the worker's HTTP API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a worker command did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// Worker answered with a non-success status.
    #[error("worker rejected the command with status {status}: {message}")]
    Rejected {
        /// HTTP status returned by the worker.
        status: u16,
        /// Response body, possibly empty.
        message: String,
    },

    /// Transport-level failure before any response arrived.
    #[error("worker unreachable: {0}")]
    Unreachable(String),

    /// No answer within the configured bound.
    #[error("worker did not answer within {0:?}")]
    Timeout(Duration),
}

impl WorkerError {
    /// Coarse class of this failure.
    pub fn reason(&self) -> WorkerFailureReason {
        match self {
            Self::Rejected { .. } => WorkerFailureReason::Rejected,
            Self::Unreachable(_) => WorkerFailureReason::Unreachable,
            Self::Timeout(_) => WorkerFailureReason::Timeout,
        }
    }
}

/// Coarse failure class reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerFailureReason {
    /// See [`WorkerError::Rejected`].
    Rejected,
    /// See [`WorkerError::Unreachable`].
    Unreachable,
    /// See [`WorkerError::Timeout`].
    Timeout,
}

impl fmt::Display for WorkerFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Rejected => "rejected",
            Self::Unreachable => "unreachable",
            Self::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

/// Out-of-process detection service. Both calls are assumed idempotent per
/// camera id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DetectionWorker: Send + Sync {
    /// Begin capture and inference for `camera_id`.
    async fn start_camera(&self, camera_id: &str) -> Result<(), WorkerError>;
    /// Stop capture for `camera_id`.
    async fn stop_camera(&self, camera_id: &str) -> Result<(), WorkerError>;
}

impl dyn DetectionWorker {
    /// Dispatch `command` to the matching trait method.
    pub async fn send(&self, command: WorkerCommand, camera_id: &str) -> Result<(), WorkerError> {
        match command {
            WorkerCommand::Start => self.start_camera(camera_id).await,
            WorkerCommand::Stop => self.stop_camera(camera_id).await,
        }
    }
}
