use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};

use crate::camera::LifecyclePhase;

/// Cameras with a lifecycle operation currently running, keyed by camera id.
#[derive(Debug, Default, Clone)]
pub(crate) struct InFlightTable {
    entries: Arc<DashMap<String, LifecyclePhase>>,
}

impl InFlightTable {
    /// Claim the camera's slot, or `None` when another operation holds it.
    pub(crate) fn try_acquire(&self, camera_id: &str, phase: LifecyclePhase) -> Option<InFlightGuard> {
        match self.entries.entry(camera_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                vacant.insert(phase);
                Some(InFlightGuard {
                    entries: Arc::clone(&self.entries),
                    camera_id: camera_id.to_string(),
                })
            }
        }
    }

    pub(crate) fn phase(&self, camera_id: &str) -> Option<LifecyclePhase> {
        self.entries.get(camera_id).map(|entry| *entry.value())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Releases the camera's slot on drop, including on early return or panic.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    entries: Arc<DashMap<String, LifecyclePhase>>,
    camera_id: String,
}

impl InFlightGuard {
    pub(crate) fn set_phase(&self, phase: LifecyclePhase) {
        if let Some(mut entry) = self.entries.get_mut(&self.camera_id) {
            *entry = phase;
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.entries.remove(&self.camera_id);
    }
}
