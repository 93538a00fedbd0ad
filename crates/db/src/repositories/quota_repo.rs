//! Repository for the quota / credit columns of the `users` table.
//!
//! Every mutation is a single statement so concurrent requests for the same
//! user cannot lose updates: window resets are conditional `UPDATE`s,
//! deduction is a decrement guarded by `credits >= amount`, and the
//! monthly counter is a server-side increment.

use lunara_core::quota::RESET_WINDOW_DAYS;
use lunara_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::user_quota::UserQuota;

/// Column list for quota queries.
const COLUMNS: &str = "\
    id AS user_id, membership_tier, videos_generated_this_month, last_reset_date, \
    credits, monthly_credits_allocated, credits_last_reset_date";

/// Provides atomic ledger operations on user rows.
pub struct QuotaRepo;

impl QuotaRepo {
    /// Read a user's quota state.
    pub async fn find(pool: &PgPool, user_id: DbId) -> Result<Option<UserQuota>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserQuota>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Zero the monthly video count if the window has elapsed at `now`.
    ///
    /// Idempotent: within a window the row is returned unchanged.
    pub async fn reset_video_count_if_due(
        pool: &PgPool,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<Option<UserQuota>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET
                videos_generated_this_month = CASE WHEN {due} THEN 0
                    ELSE videos_generated_this_month END,
                last_reset_date = CASE WHEN {due} THEN $2 ELSE last_reset_date END
             WHERE id = $1
             RETURNING {COLUMNS}",
            due = "(last_reset_date IS NULL OR last_reset_date <= $2 - make_interval(days => $3))",
        );
        sqlx::query_as::<_, UserQuota>(&query)
            .bind(user_id)
            .bind(now)
            .bind(RESET_WINDOW_DAYS as i32)
            .fetch_optional(pool)
            .await
    }

    /// Top credits up to `allotment` if the credit window has elapsed at
    /// `now`. Idempotent within a window.
    pub async fn allocate_credits_if_due(
        pool: &PgPool,
        user_id: DbId,
        allotment: i32,
        now: Timestamp,
    ) -> Result<Option<UserQuota>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET
                credits = CASE WHEN {due} THEN $4 ELSE credits END,
                monthly_credits_allocated = CASE WHEN {due} THEN $4
                    ELSE monthly_credits_allocated END,
                credits_last_reset_date = CASE WHEN {due} THEN $2
                    ELSE credits_last_reset_date END
             WHERE id = $1
             RETURNING {COLUMNS}",
            due = "(credits_last_reset_date IS NULL \
                    OR credits_last_reset_date <= $2 - make_interval(days => $3))",
        );
        sqlx::query_as::<_, UserQuota>(&query)
            .bind(user_id)
            .bind(now)
            .bind(RESET_WINDOW_DAYS as i32)
            .bind(allotment)
            .fetch_optional(pool)
            .await
    }

    /// Deduct `amount` credits if the balance covers it.
    ///
    /// Returns the new balance, or `None` when the balance was insufficient
    /// (or the user does not exist) and nothing was deducted.
    pub async fn try_deduct(
        pool: &PgPool,
        user_id: DbId,
        amount: i32,
    ) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE users SET credits = credits - $2 \
             WHERE id = $1 AND credits >= $2 \
             RETURNING credits",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(pool)
        .await
    }

    /// Add one to the monthly video count.
    pub async fn increment_video_count(pool: &PgPool, user_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET videos_generated_this_month = videos_generated_this_month + 1 \
             WHERE id = $1",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
