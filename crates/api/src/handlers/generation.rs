//! Handlers for the `/generate` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Users only ever
//! see their own jobs; a job owned by someone else is reported as missing.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use lunara_core::error::CoreError;
use lunara_core::types::DbId;
use lunara_db::models::generation_job::GenerationJob;
use lunara_db::models::status::GenerationJobStatus;
use lunara_pipeline::GenerationParams;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of `POST /generate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    pub length: Option<i32>,
    pub aspect_ratio: Option<String>,
    pub style: Option<String>,
}

impl From<GenerateRequest> for GenerationParams {
    fn from(req: GenerateRequest) -> Self {
        GenerationParams {
            prompt: req.prompt,
            length: req.length,
            aspect_ratio: req.aspect_ratio,
            style: req.style,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAccepted {
    pub job_id: DbId,
    pub status: &'static str,
    pub credits_charged: i32,
    pub remaining_credits: i32,
}

/// Client view of a job. Result fields appear only in the matching
/// terminal state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: DbId,
    pub status: &'static str,
    pub progress: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl From<GenerationJob> for JobStatusResponse {
    fn from(job: GenerationJob) -> Self {
        let status = job.status();
        let (video_url, error_code, error_message) = match status {
            GenerationJobStatus::Completed => (job.video_url, None, None),
            GenerationJobStatus::Failed => (None, job.error_code, job.error_message),
            _ => (None, None, None),
        };
        Self {
            job_id: job.id,
            status: status.as_str(),
            progress: job.progress,
            video_url,
            error_message,
            error_code,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaResponse {
    pub tier: &'static str,
    pub videos_generated_this_month: i32,
    /// `None` for unlimited tiers.
    pub monthly_video_limit: Option<i32>,
    pub max_length_secs: i32,
    pub credits: i32,
    pub monthly_credits: i32,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/generate
///
/// Charge the caller and queue a new generation. Returns 202 with the
/// pending job's id; progress is read from the status endpoint.
pub async fn generate(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let submitted = state
        .submission
        .submit(auth.user_id, input.into())
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateAccepted {
            job_id: submitted.job.id,
            status: GenerationJobStatus::Pending.as_str(),
            credits_charged: submitted.cost,
            remaining_credits: submitted.remaining_credits,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/generate/status/{job_id}
pub async fn get_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<Json<JobStatusResponse>> {
    let job = state
        .jobs
        .get_for_user(job_id, auth.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Generation job",
            id: job_id,
        }))?;

    Ok(Json(job.into()))
}

/// GET /api/v1/generate/jobs
///
/// The caller's jobs, newest first. Supports `limit` and `offset`.
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ListJobsQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = state
        .jobs
        .list_for_user(auth.user_id, params.limit, params.offset)
        .await?;
    let data: Vec<JobStatusResponse> = jobs.into_iter().map(Into::into).collect();

    Ok(Json(DataResponse { data }))
}

// ---------------------------------------------------------------------------
// Quota
// ---------------------------------------------------------------------------

/// GET /api/v1/generate/quota
///
/// Evaluates both reset windows first so the caller sees the balance the
/// next submission would be judged against.
pub async fn get_quota(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let not_found = || {
        AppError::Core(CoreError::NotFound {
            entity: "User",
            id: auth.user_id,
        })
    };

    let now = Utc::now();
    let quota = state
        .ledger
        .check_and_reset_count(auth.user_id, now)
        .await?
        .ok_or_else(not_found)?;
    let tier = quota.tier();
    let quota = state
        .ledger
        .check_and_allocate_credits(auth.user_id, tier, now)
        .await?
        .ok_or_else(not_found)?;

    let limits = tier.limits();
    Ok(Json(DataResponse {
        data: QuotaResponse {
            tier: tier.as_str(),
            videos_generated_this_month: quota.videos_generated_this_month,
            monthly_video_limit: limits.monthly_video_cap,
            max_length_secs: limits.max_length_secs,
            credits: quota.credits,
            monthly_credits: limits.monthly_credits,
        },
    }))
}
