//! Generation job runner.
//!
//! Drives one job through
//! `pending → processing → polling → downloading → completed`, or to
//! `failed` from any non-terminal state. The runner is the only writer of
//! lifecycle fields after creation and never returns an error: every
//! provider, storage or store failure becomes a terminal `failed` update
//! with a classified error code.
//!
//! Progress is tracked locally and only ever raised while the job is
//! running: 10 on pickup, 20 once the provider accepted the request,
//! linearly up to 80 while polling, 85 while downloading, 100 on success.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lunara_core::classification::{classify, format_error_message, GenerationErrorCode};
use lunara_core::generation::{clamp_duration, enhance_prompt, AspectRatio};
use lunara_core::types::DbId;
use lunara_db::models::generation_job::{GenerationJob, UpdateGenerationJob};
use lunara_db::models::media::CreateMedia;
use lunara_db::models::status::GenerationJobStatus;
use lunara_events::{EventBus, JobEvent};
use lunara_provider::{GenerationRequest, OperationStatus, ProviderError, VideoProvider};

use crate::storage::{StoredVideo, VideoStorage};
use crate::store::{JobStore, MediaCatalog, QuotaLedger, StoreError};

/// Progress once the runner picked the job up.
pub const PROGRESS_STARTED: i16 = 10;
/// Progress once the provider returned an operation handle.
pub const PROGRESS_SUBMITTED: i16 = 20;
/// Ceiling of the polling band.
pub const PROGRESS_POLLING_MAX: i16 = 80;
/// Progress while the asset is downloaded and stored.
pub const PROGRESS_DOWNLOADING: i16 = 85;
pub const PROGRESS_COMPLETED: i16 = 100;

/// Longest diagnostic payload kept on a job.
pub const RAW_RESPONSE_MAX_CHARS: usize = 4000;

/// Polling cadence and ceiling.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub poll_interval: Duration,
    /// Polls allowed before the job fails with `TIMEOUT`.
    pub max_poll_attempts: i32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 60,
        }
    }
}

/// Progress for the given poll attempt, rising from 20 toward 80.
pub fn polling_progress(attempt: i32, max_attempts: i32) -> i16 {
    if max_attempts <= 0 {
        return PROGRESS_POLLING_MAX;
    }
    let band = i64::from(PROGRESS_POLLING_MAX - PROGRESS_SUBMITTED);
    let advanced = band * i64::from(attempt.max(0)) / i64::from(max_attempts);
    let progress = i64::from(PROGRESS_SUBMITTED) + advanced;
    progress.min(i64::from(PROGRESS_POLLING_MAX)) as i16
}

/// Truncate a diagnostic payload on a character boundary.
pub fn truncate_raw(raw: &str) -> String {
    raw.chars().take(RAW_RESPONSE_MAX_CHARS).collect()
}

/// Why a run ended in `failed`.
#[derive(Debug)]
struct JobFailure {
    code: GenerationErrorCode,
    detail: Option<String>,
    raw: Option<String>,
}

impl JobFailure {
    fn new(code: GenerationErrorCode) -> Self {
        Self {
            code,
            detail: None,
            raw: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn with_raw(mut self, raw: Option<String>) -> Self {
        self.raw = raw;
        self
    }

    fn from_provider(error: &ProviderError) -> Self {
        let raw = match error {
            ProviderError::Api { body, .. } => Some(truncate_raw(body)),
            _ => None,
        };
        Self {
            code: error.classification().code,
            detail: error.detail(),
            raw,
        }
    }
}

/// Identity and current progress of the job being driven.
struct Tracker {
    job_id: DbId,
    user_id: DbId,
    progress: i16,
}

/// Executes generation jobs against the injected provider, stores and
/// storage backend.
pub struct GenerationRunner {
    jobs: Arc<dyn JobStore>,
    ledger: Arc<dyn QuotaLedger>,
    catalog: Arc<dyn MediaCatalog>,
    provider: Arc<dyn VideoProvider>,
    storage: Arc<dyn VideoStorage>,
    events: Arc<EventBus>,
    config: RunnerConfig,
}

impl GenerationRunner {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        ledger: Arc<dyn QuotaLedger>,
        catalog: Arc<dyn MediaCatalog>,
        provider: Arc<dyn VideoProvider>,
        storage: Arc<dyn VideoStorage>,
        events: Arc<EventBus>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            jobs,
            ledger,
            catalog,
            provider,
            storage,
            events,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run a job to a terminal state, starting from whatever state it was
    /// persisted in.
    ///
    /// - `pending`: full run from submission.
    /// - `processing` / `polling` with an operation handle: resume polling,
    ///   continuing the stored attempt count. A job that already used its
    ///   last poll gets one more status check before timing out.
    /// - `downloading`: one status check, then straight to the download.
    ///   The status never steps back to `polling`.
    /// - `processing` without a handle: the previous run died mid-submit
    ///   and resubmitting could generate twice, so the job fails with
    ///   `INTERRUPTED`.
    /// - terminal: nothing to do.
    pub async fn run(&self, job_id: DbId) {
        let job = match self.jobs.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(job_id, "Generation job vanished before it could run");
                return;
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to load generation job");
                return;
            }
        };

        if job.is_terminal() {
            tracing::debug!(job_id, status = job.status().as_str(), "Job already terminal");
            return;
        }

        let mut tracker = Tracker {
            job_id: job.id,
            user_id: job.user_id,
            progress: job.progress,
        };

        let result = match (job.status(), job.operation_name.clone()) {
            (GenerationJobStatus::Pending, _) => self.execute(&job, &mut tracker).await,
            (_, Some(operation_name)) => {
                tracing::info!(
                    job_id,
                    operation_name = %operation_name,
                    poll_attempts = job.poll_attempts,
                    "Resuming generation job",
                );
                self.resume(&job, operation_name, &mut tracker).await
            }
            (_, None) => Err(JobFailure::new(GenerationErrorCode::Interrupted)),
        };

        match result {
            Ok(stored) => self.complete(&job, &mut tracker, stored).await,
            Err(failure) => self.fail(&tracker, failure).await,
        }
    }

    /// Full run for a pending job.
    async fn execute(
        &self,
        job: &GenerationJob,
        tracker: &mut Tracker,
    ) -> Result<StoredVideo, JobFailure> {
        if !self.provider.is_configured() {
            return Err(JobFailure::new(GenerationErrorCode::ConfigError));
        }

        let enhanced = enhance_prompt(&job.prompt, job.style.as_deref());
        self.advance(
            tracker,
            GenerationJobStatus::Processing,
            PROGRESS_STARTED,
            UpdateGenerationJob {
                enhanced_prompt: Some(enhanced.clone()),
                started_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await?;

        let request = GenerationRequest {
            prompt: enhanced,
            duration_secs: clamp_duration(job.duration_secs),
            aspect_ratio: AspectRatio::from_request(Some(&job.aspect_ratio)),
        };
        let operation_name = self.provider.submit(&request).await.map_err(|e| {
            tracing::warn!(job_id = job.id, error = %e, "Provider rejected submission");
            JobFailure::from_provider(&e)
        })?;
        tracing::info!(job_id = job.id, operation_name = %operation_name, "Generation submitted");

        self.advance(
            tracker,
            GenerationJobStatus::Polling,
            PROGRESS_SUBMITTED,
            UpdateGenerationJob {
                operation_name: Some(operation_name.clone()),
                poll_attempts: Some(0),
                ..Default::default()
            },
        )
        .await?;

        let operation = self.poll_until_done(tracker, &operation_name, 0).await?;
        self.download(tracker, operation).await
    }

    /// Continue a run whose operation handle is already persisted.
    async fn resume(
        &self,
        job: &GenerationJob,
        operation_name: String,
        tracker: &mut Tracker,
    ) -> Result<StoredVideo, JobFailure> {
        let downloading = job.status() == GenerationJobStatus::Downloading;
        if downloading || job.poll_attempts >= self.config.max_poll_attempts {
            let operation = self
                .confirm_finished(tracker, &operation_name, job.poll_attempts, downloading)
                .await?;
            return self.download(tracker, operation).await;
        }

        self.advance(
            tracker,
            GenerationJobStatus::Polling,
            PROGRESS_SUBMITTED,
            UpdateGenerationJob::default(),
        )
        .await?;

        let operation = self
            .poll_until_done(tracker, &operation_name, job.poll_attempts)
            .await?;
        self.download(tracker, operation).await
    }

    /// Single status check for an operation that was already reported done
    /// (`downloading`) or had used its last poll when the previous run
    /// stopped. The stored status and attempt count are left untouched.
    async fn confirm_finished(
        &self,
        tracker: &Tracker,
        operation_name: &str,
        attempts: i32,
        downloading: bool,
    ) -> Result<OperationStatus, JobFailure> {
        match self.provider.poll(operation_name).await {
            Ok(status) if status.done => Ok(status),
            Ok(_) if downloading => Err(JobFailure::new(GenerationErrorCode::NoVideoResult)
                .with_detail("operation no longer reports done")),
            Err(e) if downloading => {
                tracing::warn!(
                    job_id = tracker.job_id,
                    error = %e,
                    "Status check before download failed",
                );
                Err(JobFailure::from_provider(&e))
            }
            _ => {
                tracing::warn!(job_id = tracker.job_id, attempts, "Polling ceiling reached");
                Err(JobFailure::new(GenerationErrorCode::Timeout)
                    .with_detail(format!("no result after {attempts} status checks")))
            }
        }
    }

    /// Poll on a fixed cadence until the operation reports done or the
    /// attempt ceiling is hit. Transient poll failures are logged and
    /// retried on the next tick.
    async fn poll_until_done(
        &self,
        tracker: &mut Tracker,
        operation_name: &str,
        attempts_so_far: i32,
    ) -> Result<OperationStatus, JobFailure> {
        let max = self.config.max_poll_attempts;
        let mut attempt = attempts_so_far;

        loop {
            if attempt >= max {
                tracing::warn!(job_id = tracker.job_id, attempts = attempt, "Polling ceiling reached");
                return Err(JobFailure::new(GenerationErrorCode::Timeout)
                    .with_detail(format!("no result after {attempt} status checks")));
            }

            tokio::time::sleep(self.config.poll_interval).await;
            attempt += 1;

            let polled = self.provider.poll(operation_name).await;

            self.advance(
                tracker,
                GenerationJobStatus::Polling,
                polling_progress(attempt, max),
                UpdateGenerationJob {
                    poll_attempts: Some(attempt),
                    ..Default::default()
                },
            )
            .await?;

            match polled {
                Ok(status) if status.done => {
                    tracing::info!(job_id = tracker.job_id, attempt, "Generation operation finished");
                    return Ok(status);
                }
                Ok(_) => {
                    tracing::debug!(job_id = tracker.job_id, attempt, "Generation still running");
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = tracker.job_id,
                        attempt,
                        code = %e.classification().code,
                        error = %e,
                        "Transient poll failure",
                    );
                }
            }
        }
    }

    /// Inspect a finished operation, fetch its asset and store it.
    async fn download(
        &self,
        tracker: &mut Tracker,
        operation: OperationStatus,
    ) -> Result<StoredVideo, JobFailure> {
        let raw = serde_json::to_string(&operation.raw)
            .ok()
            .map(|s| truncate_raw(&s));

        if let Some(error) = &operation.error {
            let classification = classify(error);
            return Err(JobFailure::new(classification.code)
                .with_detail(error.message.clone())
                .with_raw(raw));
        }

        if operation.moderation_filtered_count > 0 {
            let failure = JobFailure::new(GenerationErrorCode::ContentFiltered).with_raw(raw);
            return Err(if operation.moderation_reasons.is_empty() {
                failure
            } else {
                failure.with_detail(operation.moderation_reasons.join("; "))
            });
        }

        let Some(locator) = operation.video_uri else {
            return Err(JobFailure::new(GenerationErrorCode::NoVideoResult).with_raw(raw));
        };

        self.advance(
            tracker,
            GenerationJobStatus::Downloading,
            PROGRESS_DOWNLOADING,
            UpdateGenerationJob {
                raw_api_response: raw,
                ..Default::default()
            },
        )
        .await?;

        let bytes = self.provider.fetch_asset(&locator).await.map_err(|e| {
            tracing::warn!(job_id = tracker.job_id, error = %e, "Asset download failed");
            let detail = match &e {
                ProviderError::Api { status, .. } => format!("HTTP {status}"),
                other => other.to_string(),
            };
            JobFailure::new(GenerationErrorCode::DownloadFailed).with_detail(detail)
        })?;

        self.storage.write(&bytes).await.map_err(|e| {
            tracing::error!(job_id = tracker.job_id, error = %e, "Failed to store video");
            JobFailure::new(e.code()).with_detail(e.to_string())
        })
    }

    /// Catalog the stored video and mark the job completed.
    async fn complete(&self, job: &GenerationJob, tracker: &mut Tracker, stored: StoredVideo) {
        let media = CreateMedia {
            user_id: job.user_id,
            generation_job_id: job.id,
            prompt: job.prompt.clone(),
            video_url: stored.public_url.clone(),
            file_path: stored.file_path.clone(),
            file_size_bytes: i64::try_from(stored.size_bytes).unwrap_or(i64::MAX),
            duration_secs: job.duration_secs,
            aspect_ratio: job.aspect_ratio.clone(),
        };
        if let Err(e) = self.catalog.create(&media).await {
            tracing::error!(job_id = job.id, error = %e, "Failed to catalog video");
            if let Err(e) = self.storage.delete(&stored.key).await {
                tracing::warn!(job_id = job.id, error = %e, "Failed to remove uncatalogued video");
            }
            let failure = JobFailure::new(GenerationErrorCode::SaveFailed);
            self.fail(tracker, failure).await;
            return;
        }

        let update = UpdateGenerationJob {
            video_url: Some(stored.public_url.clone()),
            completed_at: Some(Utc::now()),
            ..UpdateGenerationJob::status(GenerationJobStatus::Completed)
                .with_progress(PROGRESS_COMPLETED)
        };
        if let Err(e) = self.jobs.update(job.id, &update).await {
            let failure = store_failure(job.id, e);
            self.discard(job.id, &stored).await;
            self.fail(tracker, failure).await;
            return;
        }
        tracker.progress = PROGRESS_COMPLETED;

        if let Err(e) = self.ledger.increment_video_count(job.user_id).await {
            tracing::error!(
                job_id = job.id,
                user_id = job.user_id,
                error = %e,
                "Failed to increment monthly video count",
            );
        }

        tracing::info!(
            job_id = job.id,
            user_id = job.user_id,
            video_url = %stored.public_url,
            size_bytes = stored.size_bytes,
            "Generation completed",
        );
        self.events
            .publish(JobEvent::completed(job.id, job.user_id, &stored.public_url));
    }

    /// Undo the catalog row and stored file of a job that could not be
    /// marked completed.
    async fn discard(&self, job_id: DbId, stored: &StoredVideo) {
        if let Err(e) = self.catalog.delete_for_job(job_id).await {
            tracing::warn!(job_id, error = %e, "Failed to remove catalog row");
        }
        if let Err(e) = self.storage.delete(&stored.key).await {
            tracing::warn!(job_id, error = %e, "Failed to remove stored video");
        }
    }

    /// Write the terminal failure. Progress stays where it was.
    async fn fail(&self, tracker: &Tracker, failure: JobFailure) {
        let message = format_error_message(failure.code, failure.detail.as_deref());
        let update = UpdateGenerationJob {
            error_code: Some(failure.code.as_str().to_string()),
            error_message: Some(message.clone()),
            raw_api_response: failure.raw,
            completed_at: Some(Utc::now()),
            ..UpdateGenerationJob::status(GenerationJobStatus::Failed)
        };

        match self.jobs.update(tracker.job_id, &update).await {
            Ok(_) => tracing::warn!(
                job_id = tracker.job_id,
                code = %failure.code,
                error_message = %message,
                "Generation failed",
            ),
            Err(e) => {
                tracing::error!(job_id = tracker.job_id, error = %e, "Failed to mark job failed");
                return;
            }
        }

        self.events.publish(JobEvent::failed(
            tracker.job_id,
            tracker.user_id,
            failure.code,
            &message,
        ));
    }

    /// Persist a status change, raising progress to at least `progress`.
    async fn advance(
        &self,
        tracker: &mut Tracker,
        status: GenerationJobStatus,
        progress: i16,
        mut update: UpdateGenerationJob,
    ) -> Result<(), JobFailure> {
        tracker.progress = tracker.progress.max(progress);
        update.status_id = Some(status.id());
        update.progress = Some(tracker.progress);

        self.jobs
            .update(tracker.job_id, &update)
            .await
            .map_err(|e| store_failure(tracker.job_id, e))?;

        self.events.publish(JobEvent::progress(
            tracker.job_id,
            tracker.user_id,
            status.as_str(),
            tracker.progress,
        ));
        Ok(())
    }
}

fn store_failure(job_id: DbId, error: StoreError) -> JobFailure {
    tracing::error!(job_id, error = %error, "Job store update failed");
    JobFailure::new(GenerationErrorCode::UnknownError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polling_progress_band() {
        assert_eq!(polling_progress(0, 60), 20);
        assert_eq!(polling_progress(1, 60), 21);
        assert_eq!(polling_progress(30, 60), 50);
        assert_eq!(polling_progress(60, 60), 80);
        assert_eq!(polling_progress(90, 60), 80);
    }

    #[test]
    fn polling_progress_is_non_decreasing() {
        let max = 7;
        let values: Vec<_> = (0..=max).map(|a| polling_progress(a, max)).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn raw_payload_is_truncated_on_char_boundary() {
        let long = "é".repeat(RAW_RESPONSE_MAX_CHARS + 10);
        let truncated = truncate_raw(&long);
        assert_eq!(truncated.chars().count(), RAW_RESPONSE_MAX_CHARS);
        assert_eq!(truncate_raw("short"), "short");
    }
}
