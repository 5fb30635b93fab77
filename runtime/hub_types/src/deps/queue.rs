//! Delivery of invalidated artifacts to the deoptimizer.

use crossbeam::channel::{self, Receiver, Sender};

use super::ArtifactHandle;
use crate::record::TypeRecord;

/// Receives invalidated artifacts synchronously, inside the write-locked
/// section of the definition that falsified them.
///
/// Implementations must not block or touch the hierarchy: hand the work to
/// another thread and return.
pub trait DeoptimizationListener: Send + Sync {
    fn artifacts_invalidated(&self, cause: &TypeRecord, artifacts: &[ArtifactHandle]);
}

/// Unbounded queue of invalidated artifact handles.
///
/// Every hierarchy owns one; the deoptimizer drains it from its own thread
/// (or blocks on [`receiver`](Self::receiver)).
#[derive(Clone, Debug)]
pub struct InvalidationQueue {
    sender: Sender<ArtifactHandle>,
    receiver: Receiver<ArtifactHandle>,
}

impl InvalidationQueue {
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self { sender, receiver }
    }

    /// Everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<ArtifactHandle> {
        self.receiver.try_iter().collect()
    }

    pub fn receiver(&self) -> Receiver<ArtifactHandle> {
        self.receiver.clone()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for InvalidationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeoptimizationListener for InvalidationQueue {
    fn artifacts_invalidated(&self, cause: &TypeRecord, artifacts: &[ArtifactHandle]) {
        for &artifact in artifacts {
            // Both ends live in `self`, so the channel cannot be disconnected.
            let _ = self.sender.send(artifact);
        }
        tracing::debug!(
            cause = cause.id().raw(),
            count = artifacts.len(),
            "queued artifacts for deoptimization"
        );
    }
}
