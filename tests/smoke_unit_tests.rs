//! Smoke Screen Unit tests for task portal components
//!
//! These test are unit tests that span the codebase, testing behavior in
//! isolation from integration scenarios. These are intended as smoke-screen
//! and generally test the happy-path.
//!

use std::collections::HashSet;

use chrono::{Datelike, Timelike, Utc};
use task_portal::{
    task::{Action, TaskStatus},
    types::{Money, TimeStamp},
    user::Role,
    utils::{SERVICE_HRP, TASK_HRP, USER_HRP, new_uuid_to_bech32, owner_prefix, seq_key},
};

// ID AND KEY TESTS
#[cfg(test)]
mod id_tests {
    use super::*;

    /// Every record kind mints ids under its own prefix
    #[test]
    fn record_ids_carry_their_prefix() {
        for (hrp, expected) in [(USER_HRP, "user_1"), (SERVICE_HRP, "svc_1"), (TASK_HRP, "task_1")] {
            let id = new_uuid_to_bech32(hrp).unwrap();
            assert!(id.starts_with(expected), "{id} should start with {expected}");
        }
    }

    /// Ids minted back to back never collide
    #[test]
    fn minted_ids_are_distinct() {
        let ids: HashSet<String> = (0..64)
            .map(|_| new_uuid_to_bech32(TASK_HRP).unwrap())
            .collect();
        assert_eq!(ids.len(), 64);
    }

    /// Per-user keys sort by sequence number, not by digit count
    #[test]
    fn seq_keys_order_numerically() {
        let mut keys: Vec<String> = [100u64, 2, 10, 0].iter().map(|n| seq_key("user_1abc", *n)).collect();
        keys.sort();

        assert_eq!(keys[0], seq_key("user_1abc", 0));
        assert_eq!(keys[3], seq_key("user_1abc", 100));
    }

    /// A user's prefix does not match keys of another user whose id it begins
    #[test]
    fn owner_prefix_stops_at_the_separator() {
        let prefix = owner_prefix("user_1abc");

        assert!(seq_key("user_1abc", 7).starts_with(&prefix));
        assert!(!seq_key("user_1abcd", 7).starts_with(&prefix));
    }
}

// TYPES MODULE TESTS
#[cfg(test)]
mod types_tests {
    use super::*;

    /// Test that TimeStamp::now() creates a timestamp close to current time
    #[test]
    fn timestamp_now_is_current_time() {
        let ts = TimeStamp::now();
        let now = Utc::now();

        let diff = (now - ts.to_datetime_utc()).num_seconds().abs();
        assert!(diff < 1);
    }

    /// Test that TimeStamp can be created with specific date/time values
    #[test]
    fn timestamp_new_with_creates_specific_time() {
        let ts = TimeStamp::new_with(2024, 6, 15, 10, 30, 0).unwrap();
        let dt = ts.to_datetime_utc();

        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 6);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    /// Test that impossible calendar dates are refused rather than panicking
    #[test]
    fn timestamp_new_with_rejects_invalid_dates() {
        assert!(TimeStamp::new_with(2024, 2, 30, 0, 0, 0).is_none());
    }

    /// Test that money parses and prints at two fractional digits
    #[test]
    fn money_parses_and_prints() {
        let fee: Money = "100".parse().unwrap();
        assert_eq!(fee.to_string(), "100.00");
        assert_eq!(fee, Money::from_cents(10_000));
    }
}

// TASK AND ROLE TESTS
#[cfg(test)]
mod task_tests {
    use super::*;

    /// Test that a fresh task can only be accepted or declined
    #[test]
    fn pending_offers_accept_or_decline() {
        let reachable: Vec<TaskStatus> = Action::TRANSITIONS
            .iter()
            .filter_map(|a| TaskStatus::Pending.next(*a))
            .collect();

        assert_eq!(reachable, vec![TaskStatus::Accepted, TaskStatus::Declined]);
    }

    /// Test that statuses print as their stored names
    #[test]
    fn status_names() {
        assert_eq!(TaskStatus::Queried.to_string(), "queried");
        assert_eq!(Role::SuperAdmin.to_string(), "super_admin");
    }
}
