//! Repository for the `generation_jobs` table.
//!
//! Plain persistence: no state-machine rules live here. The runner is the
//! only writer of lifecycle fields after creation.

use lunara_core::types::DbId;
use sqlx::PgPool;

use crate::models::generation_job::{CreateGenerationJob, GenerationJob, UpdateGenerationJob};
use crate::models::status::{GenerationJobStatus, StatusId, NON_TERMINAL_JOB_STATUSES};

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    id, user_id, prompt, enhanced_prompt, length_secs, duration_secs, \
    aspect_ratio, style, status_id, progress, operation_name, poll_attempts, \
    video_url, error_code, error_message, raw_api_response, credits_charged, \
    created_at, started_at, completed_at, updated_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 20;

/// Provides persistence operations for generation jobs.
pub struct GenerationJobRepo;

impl GenerationJobRepo {
    /// Insert a new job in `pending` with zero progress.
    pub async fn create(
        pool: &PgPool,
        input: &CreateGenerationJob,
    ) -> Result<GenerationJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO generation_jobs \
                 (user_id, prompt, length_secs, duration_secs, aspect_ratio, style, \
                  status_id, progress, credits_charged) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(input.user_id)
            .bind(&input.prompt)
            .bind(input.length_secs)
            .bind(input.duration_secs)
            .bind(&input.aspect_ratio)
            .bind(&input.style)
            .bind(GenerationJobStatus::Pending.id())
            .bind(input.credits_charged)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1");
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job by ID only if it belongs to `user_id`.
    pub async fn find_by_id_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// All jobs not yet completed or failed, oldest first.
    pub async fn list_non_terminal(pool: &PgPool) -> Result<Vec<GenerationJob>, sqlx::Error> {
        let statuses: Vec<StatusId> = NON_TERMINAL_JOB_STATUSES.iter().map(|s| s.id()).collect();
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE status_id = ANY($1) \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(&statuses)
            .fetch_all(pool)
            .await
    }

    /// A user's jobs, newest first.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<GenerationJob>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Merge the non-`None` fields of `input` into the row and bump
    /// `updated_at`.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateGenerationJob,
    ) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!(
            "UPDATE generation_jobs SET
                status_id = COALESCE($2, status_id),
                progress = COALESCE($3, progress),
                enhanced_prompt = COALESCE($4, enhanced_prompt),
                operation_name = COALESCE($5, operation_name),
                poll_attempts = COALESCE($6, poll_attempts),
                video_url = COALESCE($7, video_url),
                error_code = COALESCE($8, error_code),
                error_message = COALESCE($9, error_message),
                raw_api_response = COALESCE($10, raw_api_response),
                started_at = COALESCE($11, started_at),
                completed_at = COALESCE($12, completed_at),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(id)
            .bind(input.status_id)
            .bind(input.progress)
            .bind(&input.enhanced_prompt)
            .bind(&input.operation_name)
            .bind(input.poll_attempts)
            .bind(&input.video_url)
            .bind(&input.error_code)
            .bind(&input.error_message)
            .bind(&input.raw_api_response)
            .bind(input.started_at)
            .bind(input.completed_at)
            .fetch_optional(pool)
            .await
    }
}
