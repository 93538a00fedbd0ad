//! Persistence seams used by the submission service and the runner.
//!
//! Production wires these to Postgres ([`crate::pg`]); tests use
//! [`crate::memory::MemoryStore`]. Implementations of [`QuotaLedger`] must
//! make every mutation atomic per user.

use async_trait::async_trait;
use lunara_core::quota::MembershipTier;
use lunara_core::types::{DbId, Timestamp};
use lunara_db::models::generation_job::{
    CreateGenerationJob, GenerationJob, UpdateGenerationJob,
};
use lunara_db::models::media::{CreateMedia, Media};
use lunara_db::models::user_quota::UserQuota;

/// Errors from a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: DbId },
}

/// Generation job records. No lifecycle rules live here.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a `pending` job with zero progress.
    async fn create(&self, input: &CreateGenerationJob) -> Result<GenerationJob, StoreError>;

    async fn get(&self, id: DbId) -> Result<Option<GenerationJob>, StoreError>;

    /// Read a job only if `user_id` owns it.
    async fn get_for_user(
        &self,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<GenerationJob>, StoreError>;

    /// Every job not yet completed or failed, oldest first.
    async fn list_non_terminal(&self) -> Result<Vec<GenerationJob>, StoreError>;

    /// A user's jobs, newest first.
    async fn list_for_user(
        &self,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<GenerationJob>, StoreError>;

    /// Merge the set fields of `input` and bump `updated_at`.
    async fn update(
        &self,
        id: DbId,
        input: &UpdateGenerationJob,
    ) -> Result<Option<GenerationJob>, StoreError>;

    /// Cheap round trip used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Per-user monthly video allowance and credit balance.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    async fn get(&self, user_id: DbId) -> Result<Option<UserQuota>, StoreError>;

    /// Zero the video counter if the 30-day window elapsed at `now`.
    /// Idempotent within a window.
    async fn check_and_reset_count(
        &self,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<Option<UserQuota>, StoreError>;

    /// Top credits up to the tier's allotment if the credit window elapsed
    /// at `now`. Idempotent within a window.
    async fn check_and_allocate_credits(
        &self,
        user_id: DbId,
        tier: MembershipTier,
        now: Timestamp,
    ) -> Result<Option<UserQuota>, StoreError>;

    /// Atomically deduct `amount` if the balance covers it. Returns the new
    /// balance, or `None` when nothing was deducted.
    async fn try_deduct(&self, user_id: DbId, amount: i32) -> Result<Option<i32>, StoreError>;

    async fn increment_video_count(&self, user_id: DbId) -> Result<(), StoreError>;
}

/// Durable catalog of finished videos.
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    async fn create(&self, input: &CreateMedia) -> Result<Media, StoreError>;

    /// Remove the row cataloguing a job's video, if any.
    async fn delete_for_job(&self, job_id: DbId) -> Result<(), StoreError>;
}
