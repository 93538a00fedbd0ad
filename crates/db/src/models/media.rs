//! Durable media catalog rows, one per successfully generated video.

use lunara_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `media` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Media {
    pub id: DbId,
    pub user_id: DbId,
    pub generation_job_id: DbId,
    pub prompt: String,
    pub video_url: String,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub duration_secs: i32,
    pub aspect_ratio: String,
    pub created_at: Timestamp,
}

/// DTO for cataloguing a finished video.
#[derive(Debug, Clone)]
pub struct CreateMedia {
    pub user_id: DbId,
    pub generation_job_id: DbId,
    pub prompt: String,
    pub video_url: String,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub duration_secs: i32,
    pub aspect_ratio: String,
}
