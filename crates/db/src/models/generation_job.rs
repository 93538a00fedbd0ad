//! Generation job entity and DTOs.

use lunara_core::classification::GenerationErrorCode;
use lunara_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{GenerationJobStatus, StatusId};

/// A row from the `generation_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GenerationJob {
    pub id: DbId,
    pub user_id: DbId,
    pub prompt: String,
    pub enhanced_prompt: Option<String>,
    /// Length the user asked for, before provider clamping.
    pub length_secs: i32,
    /// Duration sent to the provider.
    pub duration_secs: i32,
    pub aspect_ratio: String,
    pub style: Option<String>,
    pub status_id: StatusId,
    pub progress: i16,
    pub operation_name: Option<String>,
    pub poll_attempts: i32,
    pub video_url: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub raw_api_response: Option<String>,
    pub credits_charged: i32,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl GenerationJob {
    /// Decoded lifecycle status. Unknown IDs are treated as failed.
    pub fn status(&self) -> GenerationJobStatus {
        GenerationJobStatus::from_id(self.status_id).unwrap_or(GenerationJobStatus::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Decoded error code, when the job failed with a known code.
    pub fn error_code(&self) -> Option<GenerationErrorCode> {
        self.error_code.as_deref().and_then(GenerationErrorCode::parse)
    }
}

/// DTO for inserting a new pending job.
#[derive(Debug, Clone)]
pub struct CreateGenerationJob {
    pub user_id: DbId,
    pub prompt: String,
    pub length_secs: i32,
    pub duration_secs: i32,
    pub aspect_ratio: String,
    pub style: Option<String>,
    pub credits_charged: i32,
}

/// Partial update. `None` fields keep their stored value; `updated_at` is
/// always bumped.
#[derive(Debug, Clone, Default)]
pub struct UpdateGenerationJob {
    pub status_id: Option<StatusId>,
    pub progress: Option<i16>,
    pub enhanced_prompt: Option<String>,
    pub operation_name: Option<String>,
    pub poll_attempts: Option<i32>,
    pub video_url: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub raw_api_response: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl UpdateGenerationJob {
    pub fn status(status: GenerationJobStatus) -> Self {
        Self {
            status_id: Some(status.id()),
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: i16) -> Self {
        self.progress = Some(progress);
        self
    }
}
