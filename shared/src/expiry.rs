//! Expiry classification
//!
//! Status is always computed on read; nothing here touches batch state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// Freshness of a batch relative to its expiry date
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ExpiryStatus {
    Fresh,
    NearingExpiry,
    Expired,
}

impl ExpiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryStatus::Fresh => "fresh",
            ExpiryStatus::NearingExpiry => "nearing-expiry",
            ExpiryStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpiryClassification {
    pub remaining_days: i64,
    pub status: ExpiryStatus,
}

/// Whole days until `expires_at`, rounded up.
///
/// Anything still inside its final day counts as day 0; a batch becomes
/// negative only once a full day has passed since expiry.
pub fn remaining_days(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (expires_at - now).num_seconds();
    let whole = seconds.div_euclid(SECONDS_PER_DAY);
    if seconds.rem_euclid(SECONDS_PER_DAY) > 0 {
        whole + 1
    } else {
        whole
    }
}

/// Classify a batch expiring at `expires_at` as seen at `now`
pub fn classify(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    lead_days: i32,
) -> ExpiryClassification {
    let remaining_days = remaining_days(expires_at, now);
    let status = if remaining_days < 0 {
        ExpiryStatus::Expired
    } else if remaining_days <= i64::from(lead_days) {
        ExpiryStatus::NearingExpiry
    } else {
        ExpiryStatus::Fresh
    };

    ExpiryClassification {
        remaining_days,
        status,
    }
}

/// Whether a batch with `remaining_days` belongs in an expiring report
/// covering the next `within_days`
pub fn is_expiring_within(remaining_days: i64, within_days: i64) -> bool {
    (0..=within_days).contains(&remaining_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn test_remaining_days_whole_days() {
        assert_eq!(remaining_days(day(7), day(0)), 7);
        assert_eq!(remaining_days(day(7), day(6)), 1);
        assert_eq!(remaining_days(day(7), day(7)), 0);
        assert_eq!(remaining_days(day(7), day(8)), -1);
    }

    #[test]
    fn test_remaining_days_rounds_up() {
        let now = day(0) + Duration::hours(12);
        assert_eq!(remaining_days(day(1), now), 1);
        // Half a day past expiry still rounds up to zero
        assert_eq!(remaining_days(day(1), day(1) + Duration::hours(12)), 0);
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(classify(day(40), day(0), 30).status, ExpiryStatus::Fresh);
        assert_eq!(classify(day(30), day(0), 30).status, ExpiryStatus::NearingExpiry);
        assert_eq!(classify(day(0), day(0), 30).status, ExpiryStatus::NearingExpiry);
        assert_eq!(classify(day(0), day(2), 30).status, ExpiryStatus::Expired);
    }

    #[test]
    fn test_zero_lead_time() {
        assert_eq!(classify(day(1), day(0), 0).status, ExpiryStatus::Fresh);
        assert_eq!(classify(day(0), day(0), 0).status, ExpiryStatus::NearingExpiry);
    }

    #[test]
    fn test_is_expiring_within() {
        assert!(is_expiring_within(0, 7));
        assert!(is_expiring_within(7, 7));
        assert!(!is_expiring_within(8, 7));
        assert!(!is_expiring_within(-1, 7));
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&ExpiryStatus::NearingExpiry).unwrap();
        assert_eq!(json, "\"nearing-expiry\"");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            /// Same inputs, same label
            #[test]
            fn prop_classify_is_deterministic(
                expiry_min in -100_000i64..100_000,
                lead in 0i32..90
            ) {
                let expires_at = day(0) + Duration::minutes(expiry_min);
                prop_assert_eq!(classify(expires_at, day(0), lead), classify(expires_at, day(0), lead));
            }

            /// Status follows remaining days against the lead time
            #[test]
            fn prop_status_matches_thresholds(
                expiry_min in -100_000i64..100_000,
                lead in 0i32..90
            ) {
                let expires_at = day(0) + Duration::minutes(expiry_min);
                let result = classify(expires_at, day(0), lead);
                let expected = if result.remaining_days < 0 {
                    ExpiryStatus::Expired
                } else if result.remaining_days <= i64::from(lead) {
                    ExpiryStatus::NearingExpiry
                } else {
                    ExpiryStatus::Fresh
                };
                prop_assert_eq!(result.status, expected);
            }

            /// Remaining days is the ceiling of the day distance
            #[test]
            fn prop_remaining_days_is_ceiling(expiry_min in -100_000i64..100_000) {
                let expires_at = day(0) + Duration::minutes(expiry_min);
                let days = remaining_days(expires_at, day(0));
                prop_assert!(Duration::days(days) >= Duration::minutes(expiry_min));
                prop_assert!(Duration::days(days - 1) < Duration::minutes(expiry_min));
            }
        }
    }
}
