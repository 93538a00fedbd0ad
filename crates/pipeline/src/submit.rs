//! Generation request intake: validate, settle quota and credits, persist
//! a `pending` job and enqueue it.
//!
//! Order matters. Window resets run first so caps and balances are judged
//! against the current period; the cap and length checks run before any
//! credit moves; the deduction is a single atomic conditional decrement and
//! happens before the job exists, so a refused deduction leaves no job
//! behind.

use std::sync::Arc;

use chrono::Utc;
use lunara_core::error::CoreError;
use lunara_core::generation::{
    clamp_duration, resolve_length, validate_prompt, validate_style, AspectRatio,
};
use lunara_core::quota::{check_length, check_video_cap, compute_cost, QuotaViolation};
use lunara_core::types::DbId;
use lunara_db::models::generation_job::{CreateGenerationJob, GenerationJob};
use lunara_provider::VideoProvider;

use crate::queue::JobQueue;
use crate::store::{JobStore, QuotaLedger, StoreError};

/// Client-supplied generation parameters.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    pub prompt: String,
    /// Requested length in seconds; defaults when absent.
    pub length: Option<i32>,
    pub aspect_ratio: Option<String>,
    pub style: Option<String>,
}

/// A job accepted for generation.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub job: GenerationJob,
    pub cost: i32,
    pub remaining_credits: i32,
}

/// Reasons a request is refused before any provider call.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error(transparent)]
    Quota(#[from] QuotaViolation),

    /// Provider credentials are missing.
    #[error("Video generation is not configured")]
    NotConfigured,

    #[error("User {0} not found")]
    UserNotFound(DbId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Accepts generation requests on behalf of authenticated users.
pub struct SubmissionService {
    jobs: Arc<dyn JobStore>,
    ledger: Arc<dyn QuotaLedger>,
    provider: Arc<dyn VideoProvider>,
    queue: JobQueue,
}

impl SubmissionService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        ledger: Arc<dyn QuotaLedger>,
        provider: Arc<dyn VideoProvider>,
        queue: JobQueue,
    ) -> Self {
        Self {
            jobs,
            ledger,
            provider,
            queue,
        }
    }

    /// Validate, charge and persist a new job, then hand it to the worker.
    pub async fn submit(
        &self,
        user_id: DbId,
        params: GenerationParams,
    ) -> Result<SubmittedJob, SubmitError> {
        validate_prompt(&params.prompt)?;
        validate_style(params.style.as_deref())?;
        let length_secs = resolve_length(params.length)?;

        if !self.provider.is_configured() {
            return Err(SubmitError::NotConfigured);
        }

        let now = Utc::now();
        let quota = self
            .ledger
            .check_and_reset_count(user_id, now)
            .await?
            .ok_or(SubmitError::UserNotFound(user_id))?;
        let tier = quota.tier();
        let quota = self
            .ledger
            .check_and_allocate_credits(user_id, tier, now)
            .await?
            .ok_or(SubmitError::UserNotFound(user_id))?;

        check_video_cap(tier, quota.videos_generated_this_month)?;
        check_length(tier, length_secs)?;

        let cost = compute_cost(length_secs, tier);
        let Some(remaining_credits) = self.ledger.try_deduct(user_id, cost).await? else {
            return Err(QuotaViolation::InsufficientCredits {
                required: cost,
                available: quota.credits,
            }
            .into());
        };

        let input = CreateGenerationJob {
            user_id,
            prompt: params.prompt.trim().to_string(),
            length_secs,
            duration_secs: clamp_duration(length_secs),
            aspect_ratio: AspectRatio::from_request(params.aspect_ratio.as_deref())
                .as_str()
                .to_string(),
            style: params
                .style
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            credits_charged: cost,
        };
        let job = match self.jobs.create(&input).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(
                    user_id,
                    credits = cost,
                    error = %e,
                    "Credits deducted but generation job could not be created",
                );
                return Err(e.into());
            }
        };

        tracing::info!(
            job_id = job.id,
            user_id,
            tier = tier.as_str(),
            length_secs,
            cost,
            remaining_credits,
            "Generation job created",
        );

        if let Err(e) = self.queue.enqueue(job.id) {
            // The job stays pending and is picked up by recovery on restart.
            tracing::warn!(job_id = job.id, error = %e, "Generation job not dispatched");
        }

        Ok(SubmittedJob {
            job,
            cost,
            remaining_credits,
        })
    }
}
