//! Postgres-backed store implementations delegating to the repositories.

use async_trait::async_trait;
use lunara_core::quota::MembershipTier;
use lunara_core::types::{DbId, Timestamp};
use lunara_db::models::generation_job::{
    CreateGenerationJob, GenerationJob, UpdateGenerationJob,
};
use lunara_db::models::media::{CreateMedia, Media};
use lunara_db::models::user_quota::UserQuota;
use lunara_db::repositories::{GenerationJobRepo, MediaRepo, QuotaRepo};
use sqlx::PgPool;

use crate::store::{JobStore, MediaCatalog, QuotaLedger, StoreError};

/// All three stores over one connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create(&self, input: &CreateGenerationJob) -> Result<GenerationJob, StoreError> {
        Ok(GenerationJobRepo::create(&self.pool, input).await?)
    }

    async fn get(&self, id: DbId) -> Result<Option<GenerationJob>, StoreError> {
        Ok(GenerationJobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn get_for_user(
        &self,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<GenerationJob>, StoreError> {
        Ok(GenerationJobRepo::find_by_id_for_user(&self.pool, id, user_id).await?)
    }

    async fn list_non_terminal(&self) -> Result<Vec<GenerationJob>, StoreError> {
        Ok(GenerationJobRepo::list_non_terminal(&self.pool).await?)
    }

    async fn list_for_user(
        &self,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<GenerationJob>, StoreError> {
        Ok(GenerationJobRepo::list_by_user(&self.pool, user_id, limit, offset).await?)
    }

    async fn update(
        &self,
        id: DbId,
        input: &UpdateGenerationJob,
    ) -> Result<Option<GenerationJob>, StoreError> {
        Ok(GenerationJobRepo::update(&self.pool, id, input).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(lunara_db::health_check(&self.pool).await?)
    }
}

#[async_trait]
impl QuotaLedger for PgStore {
    async fn get(&self, user_id: DbId) -> Result<Option<UserQuota>, StoreError> {
        Ok(QuotaRepo::find(&self.pool, user_id).await?)
    }

    async fn check_and_reset_count(
        &self,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<Option<UserQuota>, StoreError> {
        Ok(QuotaRepo::reset_video_count_if_due(&self.pool, user_id, now).await?)
    }

    async fn check_and_allocate_credits(
        &self,
        user_id: DbId,
        tier: MembershipTier,
        now: Timestamp,
    ) -> Result<Option<UserQuota>, StoreError> {
        let allotment = tier.limits().monthly_credits;
        Ok(QuotaRepo::allocate_credits_if_due(&self.pool, user_id, allotment, now).await?)
    }

    async fn try_deduct(&self, user_id: DbId, amount: i32) -> Result<Option<i32>, StoreError> {
        Ok(QuotaRepo::try_deduct(&self.pool, user_id, amount).await?)
    }

    async fn increment_video_count(&self, user_id: DbId) -> Result<(), StoreError> {
        Ok(QuotaRepo::increment_video_count(&self.pool, user_id).await?)
    }
}

#[async_trait]
impl MediaCatalog for PgStore {
    async fn create(&self, input: &CreateMedia) -> Result<Media, StoreError> {
        Ok(MediaRepo::create(&self.pool, input).await?)
    }

    async fn delete_for_job(&self, job_id: DbId) -> Result<(), StoreError> {
        MediaRepo::delete_by_job(&self.pool, job_id).await?;
        Ok(())
    }
}
