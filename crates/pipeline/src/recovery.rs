//! Startup recovery of jobs left non-terminal by a previous process.
//!
//! Every such job is handed back to the queue; the runner decides from the
//! persisted state whether to start it, resume polling its operation, or
//! fail it as interrupted.

use lunara_db::models::status::GenerationJobStatus;

use crate::queue::JobQueue;
use crate::store::{JobStore, StoreError};

/// What a recovery pass found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Pending jobs that will start from scratch.
    pub restarted: usize,
    /// Jobs with an operation handle that will resume polling.
    pub resumed: usize,
    /// Jobs that died mid-submission and will be failed.
    pub interrupted: usize,
}

impl RecoverySummary {
    pub fn total(&self) -> usize {
        self.restarted + self.resumed + self.interrupted
    }
}

/// Re-enqueue every non-terminal job. Must run before the worker starts
/// consuming so no job is driven by two runners.
pub async fn recover_jobs(
    jobs: &dyn JobStore,
    queue: &JobQueue,
) -> Result<RecoverySummary, StoreError> {
    let mut summary = RecoverySummary::default();

    for job in jobs.list_non_terminal().await? {
        match (job.status(), job.operation_name.is_some()) {
            (GenerationJobStatus::Pending, _) => summary.restarted += 1,
            (_, true) => summary.resumed += 1,
            (_, false) => summary.interrupted += 1,
        }
        if let Err(e) = queue.enqueue(job.id) {
            tracing::warn!(job_id = job.id, error = %e, "Could not enqueue recovered job");
        }
    }

    if summary.total() > 0 {
        tracing::info!(
            restarted = summary.restarted,
            resumed = summary.resumed,
            interrupted = summary.interrupted,
            "Recovered unfinished generation jobs",
        );
    }
    Ok(summary)
}
