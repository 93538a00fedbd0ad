//! Membership tiers, credit pricing, and the rolling 30-day window rules
//! used by the quota & credit ledger.
//!
//! The storage-side operations (atomic deduct, counter increment, window
//! reset) live in the db crate; this module holds the pure rules both the
//! Postgres and in-memory ledgers apply.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of a quota / credit window.
pub const RESET_WINDOW_DAYS: i64 = 30;

/// Flat cost of any generation.
pub const BASE_COST_CREDITS: i32 = 10;

/// Durations up to this many seconds carry no length surcharge.
pub const SURCHARGE_FREE_SECS: i32 = 5;

/// Credits charged per second beyond [`SURCHARGE_FREE_SECS`].
pub const CREDITS_PER_EXTRA_SEC: i32 = 2;

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// Membership tier stored on the user row as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTier {
    Free,
    Pro,
    Studio,
}

/// Static limits attached to a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    /// Videos per window; `None` is unlimited.
    pub monthly_video_cap: Option<i32>,
    /// Longest requested length accepted, in seconds.
    pub max_length_secs: i32,
    /// Credits granted at each window reset.
    pub monthly_credits: i32,
    /// Added to every generation's cost.
    pub cost_surcharge: i32,
}

impl MembershipTier {
    /// String representation for database storage.
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipTier::Free => "free",
            MembershipTier::Pro => "pro",
            MembershipTier::Studio => "studio",
        }
    }

    /// Parse the stored representation. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(MembershipTier::Free),
            "pro" => Some(MembershipTier::Pro),
            "studio" => Some(MembershipTier::Studio),
            _ => None,
        }
    }

    pub fn limits(self) -> TierLimits {
        match self {
            MembershipTier::Free => TierLimits {
                monthly_video_cap: Some(10),
                max_length_secs: 6,
                monthly_credits: 100,
                cost_surcharge: 0,
            },
            MembershipTier::Pro => TierLimits {
                monthly_video_cap: Some(100),
                max_length_secs: 8,
                monthly_credits: 1000,
                cost_surcharge: 2,
            },
            MembershipTier::Studio => TierLimits {
                monthly_video_cap: None,
                max_length_secs: 8,
                monthly_credits: 5000,
                cost_surcharge: 5,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Quota violations
// ---------------------------------------------------------------------------

/// Reasons a generation request is refused before any provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaViolation {
    #[error("Monthly video limit of {cap} reached for the {tier} tier")]
    LimitReached { tier: &'static str, cap: i32 },

    #[error("Requested length of {requested}s exceeds the {max}s maximum for the {tier} tier")]
    LengthLimit {
        tier: &'static str,
        requested: i32,
        max: i32,
    },

    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: i32, available: i32 },
}

impl QuotaViolation {
    /// Stable machine-readable code surfaced in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            QuotaViolation::LimitReached { .. } => "LIMIT_REACHED",
            QuotaViolation::LengthLimit { .. } => "LENGTH_LIMIT",
            QuotaViolation::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Credits charged for one generation of `length_secs` on `tier`.
pub fn compute_cost(length_secs: i32, tier: MembershipTier) -> i32 {
    let extra_secs = (length_secs - SURCHARGE_FREE_SECS).max(0);
    BASE_COST_CREDITS + extra_secs * CREDITS_PER_EXTRA_SEC + tier.limits().cost_surcharge
}

/// Whether a window that last reset at `last_reset` has expired at `now`.
pub fn window_elapsed(last_reset: Timestamp, now: Timestamp) -> bool {
    now.signed_duration_since(last_reset) >= chrono::Duration::days(RESET_WINDOW_DAYS)
}

/// Reject a request whose length exceeds the tier maximum.
pub fn check_length(tier: MembershipTier, requested_secs: i32) -> Result<(), QuotaViolation> {
    let max = tier.limits().max_length_secs;
    if requested_secs > max {
        return Err(QuotaViolation::LengthLimit {
            tier: tier.as_str(),
            requested: requested_secs,
            max,
        });
    }
    Ok(())
}

/// Reject a request when a finite monthly cap has been used up.
pub fn check_video_cap(tier: MembershipTier, used: i32) -> Result<(), QuotaViolation> {
    match tier.limits().monthly_video_cap {
        Some(cap) if used >= cap => Err(QuotaViolation::LimitReached {
            tier: tier.as_str(),
            cap,
        }),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    #[test]
    fn cost_for_short_free_generation_is_base() {
        assert_eq!(compute_cost(5, MembershipTier::Free), 10);
        assert_eq!(compute_cost(4, MembershipTier::Free), 10);
    }

    #[test]
    fn cost_adds_length_surcharge() {
        assert_eq!(compute_cost(8, MembershipTier::Free), 16);
    }

    #[test]
    fn higher_tiers_cost_more() {
        let free = compute_cost(6, MembershipTier::Free);
        let pro = compute_cost(6, MembershipTier::Pro);
        let studio = compute_cost(6, MembershipTier::Studio);
        assert!(free < pro && pro < studio);
    }

    #[test]
    fn cost_is_deterministic() {
        assert_eq!(
            compute_cost(7, MembershipTier::Pro),
            compute_cost(7, MembershipTier::Pro)
        );
    }

    #[test]
    fn tier_round_trips_through_storage_string() {
        for tier in [MembershipTier::Free, MembershipTier::Pro, MembershipTier::Studio] {
            assert_eq!(MembershipTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(MembershipTier::parse("platinum"), None);
    }

    #[test]
    fn window_not_elapsed_within_thirty_days() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(!window_elapsed(start, start));
        assert!(!window_elapsed(start, start + Duration::days(29)));
    }

    #[test]
    fn window_elapsed_at_thirty_days() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(window_elapsed(start, start + Duration::days(30)));
        assert!(window_elapsed(start, start + Duration::days(90)));
    }

    #[test]
    fn length_over_tier_max_is_rejected() {
        assert!(check_length(MembershipTier::Free, 6).is_ok());
        assert_matches!(
            check_length(MembershipTier::Free, 8),
            Err(QuotaViolation::LengthLimit { max: 6, .. })
        );
    }

    #[test]
    fn video_cap_applies_only_to_finite_tiers() {
        assert!(check_video_cap(MembershipTier::Free, 9).is_ok());
        assert_matches!(
            check_video_cap(MembershipTier::Free, 10),
            Err(QuotaViolation::LimitReached { cap: 10, .. })
        );
        assert!(check_video_cap(MembershipTier::Studio, 10_000).is_ok());
    }

    #[test]
    fn violation_codes_are_stable() {
        let v = QuotaViolation::InsufficientCredits {
            required: 10,
            available: 2,
        };
        assert_eq!(v.code(), "INSUFFICIENT_CREDITS");
    }
}
