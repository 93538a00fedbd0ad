//! Per-user quota and credit state (columns on the `users` table).

use lunara_core::quota::MembershipTier;
use lunara_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Quota / credit columns of a `users` row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserQuota {
    pub user_id: DbId,
    pub membership_tier: String,
    pub videos_generated_this_month: i32,
    pub last_reset_date: Option<Timestamp>,
    pub credits: i32,
    pub monthly_credits_allocated: i32,
    pub credits_last_reset_date: Option<Timestamp>,
}

impl UserQuota {
    /// Decoded tier. Rows with an unrecognised tier fall back to free.
    pub fn tier(&self) -> MembershipTier {
        MembershipTier::parse(&self.membership_tier).unwrap_or(MembershipTier::Free)
    }
}
