// Rotator fake that records every directive instead of sending it.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::control::Rotator;
use crate::metrics::RotationReason;
use crate::pool::Worker;

/// Records (worker id, reason) for every rotation request.
#[derive(Default)]
pub struct RecordingRotator {
    calls: Mutex<Vec<(usize, RotationReason)>>,
}

impl RecordingRotator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<(usize, RotationReason)> {
        self.calls.lock().clone()
    }

    pub fn count_for(&self, id: usize) -> usize {
        self.calls.lock().iter().filter(|(w, _)| *w == id).count()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl Rotator for RecordingRotator {
    async fn rotate(&self, worker: &Worker, reason: RotationReason) {
        self.calls.lock().push((worker.id(), reason));
    }
}
