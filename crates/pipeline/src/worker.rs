//! Background worker consuming the generation queue.
//!
//! Each dequeued job runs as its own task on a [`TaskTracker`] so shutdown
//! can wait for in-flight runners with a deadline. Jobs still running when
//! the deadline passes are left non-terminal and picked up by recovery on
//! the next start.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::queue::JobReceiver;
use crate::runner::GenerationRunner;

/// Dispatches queued jobs to the runner.
pub struct GenerationWorker {
    runner: Arc<GenerationRunner>,
    tasks: TaskTracker,
}

impl GenerationWorker {
    pub fn new(runner: Arc<GenerationRunner>) -> Self {
        Self {
            runner,
            tasks: TaskTracker::new(),
        }
    }

    /// Number of runners currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Consume the queue until `cancel` fires or every sender is dropped.
    pub async fn run(&self, mut receiver: JobReceiver, cancel: CancellationToken) {
        tracing::info!("Generation worker started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Generation worker shutting down");
                    break;
                }
                next = receiver.recv() => {
                    let Some(job_id) = next else {
                        tracing::info!("Generation queue closed");
                        break;
                    };
                    tracing::debug!(job_id, "Dispatching generation job");
                    let runner = Arc::clone(&self.runner);
                    self.tasks.spawn(async move { runner.run(job_id).await });
                }
            }
        }

        receiver.close();
    }

    /// Wait up to `timeout` for in-flight runners. Returns `true` if all of
    /// them finished.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.close();
        let pending = self.tasks.len();
        if pending > 0 {
            tracing::info!(pending, "Waiting for in-flight generation jobs");
        }
        match tokio::time::timeout(timeout, self.tasks.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = self.tasks.len(),
                    "Shutdown deadline reached with generation jobs still running",
                );
                false
            }
        }
    }
}
