//! In-process work queue between the submission path and the worker.
//!
//! Jobs are identified by id only; the runner reloads the persisted row, so
//! a job enqueued twice is harmless once it has reached a terminal state.

use lunara_core::types::DbId;
use tokio::sync::mpsc;

/// The worker has stopped and no longer accepts jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Generation queue is closed (job {0} not dispatched)")]
pub struct QueueClosed(pub DbId);

/// Sending half of the generation queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<DbId>,
}

/// Receiving half, owned by [`crate::GenerationWorker`].
pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<DbId>,
}

impl JobQueue {
    pub fn channel() -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, JobReceiver { receiver })
    }

    /// Hand a persisted job to the worker.
    ///
    /// A closed queue leaves the job `pending` in the store, where startup
    /// recovery will find it.
    pub fn enqueue(&self, job_id: DbId) -> Result<(), QueueClosed> {
        self.sender.send(job_id).map_err(|_| QueueClosed(job_id))
    }
}

impl JobReceiver {
    /// Next job id, or `None` once every [`JobQueue`] handle is dropped.
    pub async fn recv(&mut self) -> Option<DbId> {
        self.receiver.recv().await
    }

    /// Stop accepting new jobs; already queued ids can still be drained.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}
