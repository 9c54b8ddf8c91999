//! Camera records and the streaming lifecycle state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persisted camera record.
///
/// `is_streaming` is the externally visible truth about the detection worker:
/// it is only left `true` once the worker acknowledged a start command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    /// Stable camera identifier, also used in worker URLs.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Source stream the worker captures from.
    pub rtsp_url: String,
    /// Free-form placement label.
    pub location: Option<String>,
    /// Whether the camera may be started at all.
    pub is_enabled: bool,
    /// Whether the worker is believed to be streaming this camera.
    pub is_streaming: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last persisted change.
    pub updated_at: DateTime<Utc>,
}

impl Camera {
    /// New enabled, stopped camera.
    pub fn new(id: impl Into<String>, name: impl Into<String>, rtsp_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            rtsp_url: rtsp_url.into(),
            location: None,
            is_enabled: true,
            is_streaming: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the placement label.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Resting phase implied by the persisted flags.
    pub fn resting_phase(&self) -> LifecyclePhase {
        if self.is_streaming {
            LifecyclePhase::Streaming
        } else {
            LifecyclePhase::Stopped
        }
    }

    /// Fields embedded in alert payloads.
    pub fn summary(&self) -> CameraSummary {
        CameraSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            location: self.location.clone(),
        }
    }

    /// Apply a patch in place, bumping `updated_at` when anything changed.
    pub fn apply_patch(&mut self, patch: &CameraPatch) {
        let mut changed = false;
        if let Some(enabled) = patch.is_enabled {
            changed |= self.is_enabled != enabled;
            self.is_enabled = enabled;
        }
        if let Some(streaming) = patch.is_streaming {
            changed |= self.is_streaming != streaming;
            self.is_streaming = streaming;
        }
        if changed {
            self.updated_at = Utc::now();
        }
    }
}

/// Partial update applied by the camera store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPatch {
    /// New `is_enabled` value, if changing.
    pub is_enabled: Option<bool>,
    /// New `is_streaming` value, if changing.
    pub is_streaming: Option<bool>,
}

impl CameraPatch {
    /// Patch that only sets `is_streaming`.
    pub fn streaming(is_streaming: bool) -> Self {
        Self {
            is_streaming: Some(is_streaming),
            ..Self::default()
        }
    }
}

/// Camera fields embedded in alert payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSummary {
    /// Camera identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Placement label.
    pub location: Option<String>,
}

/// Streaming lifecycle of a camera as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Not streaming and nothing in flight.
    Stopped,
    /// Start persisted, waiting on the worker.
    Starting,
    /// Worker confirmed the start.
    Streaming,
    /// Stop persisted, waiting on the worker.
    Stopping,
}

impl LifecyclePhase {
    /// Advance the state machine, rejecting transitions it does not allow.
    ///
    /// Both begin transitions are accepted from either resting phase, so a
    /// start or stop can be re-asserted against the worker.
    pub fn apply(self, transition: LifecycleTransition) -> Result<Self, InvalidTransition> {
        use LifecyclePhase::*;
        use LifecycleTransition::*;

        match (self, transition) {
            (Stopped | Streaming, BeginStart) => Ok(Starting),
            (Starting, ConfirmStart) => Ok(Streaming),
            (Starting, RollbackStart) => Ok(Stopped),
            (Streaming | Stopped, BeginStop) => Ok(Stopping),
            (Stopping, FinishStop) => Ok(Stopped),
            (from, transition) => Err(InvalidTransition { from, transition }),
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Streaming => "streaming",
            Self::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// Steps the coordinator drives a camera through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleTransition {
    /// Start requested and persisted.
    BeginStart,
    /// Worker acknowledged the start.
    ConfirmStart,
    /// Worker failed to acknowledge; streaming flag cleared.
    RollbackStart,
    /// Stop requested and persisted.
    BeginStop,
    /// Stop finished, whatever the worker answered.
    FinishStop,
}

/// A transition the state machine does not allow from the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply {transition:?} to a camera that is {from}")]
pub struct InvalidTransition {
    /// Phase the transition was attempted from.
    pub from: LifecyclePhase,
    /// Rejected transition.
    pub transition: LifecycleTransition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_path_reaches_streaming() {
        let phase = LifecyclePhase::Stopped
            .apply(LifecycleTransition::BeginStart)
            .and_then(|p| p.apply(LifecycleTransition::ConfirmStart))
            .unwrap();
        assert_eq!(phase, LifecyclePhase::Streaming);
    }

    #[test]
    fn rollback_returns_to_stopped() {
        let phase = LifecyclePhase::Starting
            .apply(LifecycleTransition::RollbackStart)
            .unwrap();
        assert_eq!(phase, LifecyclePhase::Stopped);
    }

    #[test]
    fn start_is_accepted_from_both_resting_phases() {
        for phase in [LifecyclePhase::Stopped, LifecyclePhase::Streaming] {
            assert_eq!(
                phase.apply(LifecycleTransition::BeginStart).unwrap(),
                LifecyclePhase::Starting
            );
        }
    }

    #[test]
    fn in_flight_phases_cannot_begin_again() {
        let err = LifecyclePhase::Starting
            .apply(LifecycleTransition::BeginStart)
            .unwrap_err();
        assert_eq!(err.from, LifecyclePhase::Starting);
        assert_eq!(err.transition, LifecycleTransition::BeginStart);
        assert!(LifecyclePhase::Stopping
            .apply(LifecycleTransition::BeginStop)
            .is_err());
    }

    #[test]
    fn rollback_only_valid_while_starting() {
        assert!(LifecyclePhase::Streaming
            .apply(LifecycleTransition::RollbackStart)
            .is_err());
        assert!(LifecyclePhase::Stopping
            .apply(LifecycleTransition::RollbackStart)
            .is_err());
    }

    #[test]
    fn stop_is_accepted_from_both_resting_phases() {
        for phase in [LifecyclePhase::Streaming, LifecyclePhase::Stopped] {
            let next = phase.apply(LifecycleTransition::BeginStop).unwrap();
            assert_eq!(next, LifecyclePhase::Stopping);
            assert_eq!(
                next.apply(LifecycleTransition::FinishStop).unwrap(),
                LifecyclePhase::Stopped
            );
        }
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut camera = Camera::new("cam1", "Lobby", "rtsp://10.0.0.2/stream");
        let before = camera.updated_at;
        camera.apply_patch(&CameraPatch::streaming(true));

        assert!(camera.is_streaming);
        assert!(camera.is_enabled);
        assert!(camera.updated_at >= before);
        assert_eq!(camera.resting_phase(), LifecyclePhase::Streaming);
    }

    #[test]
    fn camera_serializes_with_camel_case_fields() {
        let camera = Camera::new("cam1", "Lobby", "rtsp://10.0.0.2/stream").with_location("HQ");
        let json = serde_json::to_value(&camera).unwrap();

        assert_eq!(json["isStreaming"], false);
        assert_eq!(json["isEnabled"], true);
        assert_eq!(json["rtspUrl"], "rtsp://10.0.0.2/stream");
        assert_eq!(json["location"], "HQ");
    }
}
