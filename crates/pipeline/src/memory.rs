//! In-memory store for tests and local experiments.
//!
//! Mirrors the Postgres semantics: partial updates merge only set fields,
//! and every ledger mutation happens under one lock so deductions cannot
//! interleave.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use lunara_core::quota::{window_elapsed, MembershipTier};
use lunara_core::types::{DbId, Timestamp};
use lunara_db::models::generation_job::{
    CreateGenerationJob, GenerationJob, UpdateGenerationJob,
};
use lunara_db::models::media::{CreateMedia, Media};
use lunara_db::models::status::GenerationJobStatus;
use lunara_db::models::user_quota::UserQuota;

use crate::store::{JobStore, MediaCatalog, QuotaLedger, StoreError};

#[derive(Default)]
struct MemoryState {
    jobs: HashMap<DbId, GenerationJob>,
    users: HashMap<DbId, UserQuota>,
    media: Vec<Media>,
    next_job_id: DbId,
    next_media_id: DbId,
}

/// Jobs, quotas and media held in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means another test thread panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add or replace a user's quota row.
    pub fn insert_user(&self, quota: UserQuota) {
        self.lock().users.insert(quota.user_id, quota);
    }

    /// A fresh user on `tier` with `credits` and both windows opened `now`.
    pub fn seed_user(&self, user_id: DbId, tier: MembershipTier, credits: i32) -> UserQuota {
        let now = Utc::now();
        let quota = UserQuota {
            user_id,
            membership_tier: tier.as_str().to_string(),
            videos_generated_this_month: 0,
            last_reset_date: Some(now),
            credits,
            monthly_credits_allocated: tier.limits().monthly_credits,
            credits_last_reset_date: Some(now),
        };
        self.insert_user(quota.clone());
        quota
    }

    /// Insert a job row as-is, keeping its id. Used to stage recovery
    /// scenarios.
    pub fn insert_job(&self, job: GenerationJob) {
        let mut state = self.lock();
        state.next_job_id = state.next_job_id.max(job.id);
        state.jobs.insert(job.id, job);
    }

    pub fn user(&self, user_id: DbId) -> Option<UserQuota> {
        self.lock().users.get(&user_id).cloned()
    }

    pub fn job(&self, id: DbId) -> Option<GenerationJob> {
        self.lock().jobs.get(&id).cloned()
    }

    pub fn job_count(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn media(&self) -> Vec<Media> {
        self.lock().media.clone()
    }
}

fn merge(job: &mut GenerationJob, input: &UpdateGenerationJob) {
    fn set<T: Clone>(field: &mut T, value: &Option<T>) {
        if let Some(v) = value {
            *field = v.clone();
        }
    }
    fn set_opt<T: Clone>(field: &mut Option<T>, value: &Option<T>) {
        if value.is_some() {
            *field = value.clone();
        }
    }

    set(&mut job.status_id, &input.status_id);
    set(&mut job.progress, &input.progress);
    set_opt(&mut job.enhanced_prompt, &input.enhanced_prompt);
    set_opt(&mut job.operation_name, &input.operation_name);
    set(&mut job.poll_attempts, &input.poll_attempts);
    set_opt(&mut job.video_url, &input.video_url);
    set_opt(&mut job.error_code, &input.error_code);
    set_opt(&mut job.error_message, &input.error_message);
    set_opt(&mut job.raw_api_response, &input.raw_api_response);
    set_opt(&mut job.started_at, &input.started_at);
    set_opt(&mut job.completed_at, &input.completed_at);
    job.updated_at = Utc::now();
}

fn is_due(last_reset: Option<Timestamp>, now: Timestamp) -> bool {
    last_reset.map_or(true, |last| window_elapsed(last, now))
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create(&self, input: &CreateGenerationJob) -> Result<GenerationJob, StoreError> {
        let mut state = self.lock();
        state.next_job_id += 1;
        let now = Utc::now();
        let job = GenerationJob {
            id: state.next_job_id,
            user_id: input.user_id,
            prompt: input.prompt.clone(),
            enhanced_prompt: None,
            length_secs: input.length_secs,
            duration_secs: input.duration_secs,
            aspect_ratio: input.aspect_ratio.clone(),
            style: input.style.clone(),
            status_id: GenerationJobStatus::Pending.id(),
            progress: 0,
            operation_name: None,
            poll_attempts: 0,
            video_url: None,
            error_code: None,
            error_message: None,
            raw_api_response: None,
            credits_charged: input.credits_charged,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        };
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: DbId) -> Result<Option<GenerationJob>, StoreError> {
        Ok(self.job(id))
    }

    async fn get_for_user(
        &self,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<GenerationJob>, StoreError> {
        Ok(self.job(id).filter(|j| j.user_id == user_id))
    }

    async fn list_non_terminal(&self) -> Result<Vec<GenerationJob>, StoreError> {
        let mut jobs: Vec<_> = self
            .lock()
            .jobs
            .values()
            .filter(|j| !j.is_terminal())
            .cloned()
            .collect();
        jobs.sort_by_key(|j| (j.created_at, j.id));
        Ok(jobs)
    }

    async fn list_for_user(
        &self,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<GenerationJob>, StoreError> {
        let limit = limit.unwrap_or(20).clamp(1, 100) as usize;
        let offset = offset.unwrap_or(0).max(0) as usize;
        let mut jobs: Vec<_> = self
            .lock()
            .jobs
            .values()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| std::cmp::Reverse((j.created_at, j.id)));
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    async fn update(
        &self,
        id: DbId,
        input: &UpdateGenerationJob,
    ) -> Result<Option<GenerationJob>, StoreError> {
        let mut state = self.lock();
        Ok(state.jobs.get_mut(&id).map(|job| {
            merge(job, input);
            job.clone()
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl QuotaLedger for MemoryStore {
    async fn get(&self, user_id: DbId) -> Result<Option<UserQuota>, StoreError> {
        Ok(self.user(user_id))
    }

    async fn check_and_reset_count(
        &self,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<Option<UserQuota>, StoreError> {
        let mut state = self.lock();
        Ok(state.users.get_mut(&user_id).map(|quota| {
            if is_due(quota.last_reset_date, now) {
                quota.videos_generated_this_month = 0;
                quota.last_reset_date = Some(now);
            }
            quota.clone()
        }))
    }

    async fn check_and_allocate_credits(
        &self,
        user_id: DbId,
        tier: MembershipTier,
        now: Timestamp,
    ) -> Result<Option<UserQuota>, StoreError> {
        let allotment = tier.limits().monthly_credits;
        let mut state = self.lock();
        Ok(state.users.get_mut(&user_id).map(|quota| {
            if is_due(quota.credits_last_reset_date, now) {
                quota.credits = allotment;
                quota.monthly_credits_allocated = allotment;
                quota.credits_last_reset_date = Some(now);
            }
            quota.clone()
        }))
    }

    async fn try_deduct(&self, user_id: DbId, amount: i32) -> Result<Option<i32>, StoreError> {
        let mut state = self.lock();
        Ok(state
            .users
            .get_mut(&user_id)
            .filter(|quota| quota.credits >= amount)
            .map(|quota| {
                quota.credits -= amount;
                quota.credits
            }))
    }

    async fn increment_video_count(&self, user_id: DbId) -> Result<(), StoreError> {
        let mut state = self.lock();
        let quota = state.users.get_mut(&user_id).ok_or(StoreError::NotFound {
            entity: "user",
            id: user_id,
        })?;
        quota.videos_generated_this_month += 1;
        Ok(())
    }
}

#[async_trait]
impl MediaCatalog for MemoryStore {
    async fn create(&self, input: &CreateMedia) -> Result<Media, StoreError> {
        let mut state = self.lock();
        state.next_media_id += 1;
        let media = Media {
            id: state.next_media_id,
            user_id: input.user_id,
            generation_job_id: input.generation_job_id,
            prompt: input.prompt.clone(),
            video_url: input.video_url.clone(),
            file_path: input.file_path.clone(),
            file_size_bytes: input.file_size_bytes,
            duration_secs: input.duration_secs,
            aspect_ratio: input.aspect_ratio.clone(),
            created_at: Utc::now(),
        };
        state.media.push(media.clone());
        Ok(media)
    }

    async fn delete_for_job(&self, job_id: DbId) -> Result<(), StoreError> {
        self.lock().media.retain(|m| m.generation_job_id != job_id);
        Ok(())
    }
}
