//! Repository for the `media` catalog table.

use lunara_core::types::DbId;
use sqlx::PgPool;

use crate::models::media::{CreateMedia, Media};

/// Column list for `media` queries.
const COLUMNS: &str = "\
    id, user_id, generation_job_id, prompt, video_url, file_path, \
    file_size_bytes, duration_secs, aspect_ratio, created_at";

pub struct MediaRepo;

impl MediaRepo {
    /// Insert a catalog row for a finished video.
    pub async fn create(pool: &PgPool, input: &CreateMedia) -> Result<Media, sqlx::Error> {
        let query = format!(
            "INSERT INTO media \
                 (user_id, generation_job_id, prompt, video_url, file_path, \
                  file_size_bytes, duration_secs, aspect_ratio) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Media>(&query)
            .bind(input.user_id)
            .bind(input.generation_job_id)
            .bind(&input.prompt)
            .bind(&input.video_url)
            .bind(&input.file_path)
            .bind(input.file_size_bytes)
            .bind(input.duration_secs)
            .bind(&input.aspect_ratio)
            .fetch_one(pool)
            .await
    }

    /// Find the catalog row created for a generation job.
    pub async fn find_by_job(pool: &PgPool, job_id: DbId) -> Result<Option<Media>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM media WHERE generation_job_id = $1");
        sqlx::query_as::<_, Media>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete the catalog row for a generation job. Returns `true` if a row
    /// was removed.
    pub async fn delete_by_job(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM media WHERE generation_job_id = $1")
            .bind(job_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
