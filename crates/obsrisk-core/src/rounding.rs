// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Month arithmetic for maintenance expiry.

use chrono::{DateTime, Utc};

/// Average month length used to turn a duration into months (30.44 days).
pub const SECONDS_PER_MONTH: f64 = 30.44 * 86_400.0;

/// Round to the nearest integer, halves going away from zero.
///
/// `2.5 -> 3`, `-2.5 -> -3`, `2.4 -> 2`.
pub fn round_half_away_from_zero(value: f64) -> i64 {
    let rounded = if value < 0.0 {
        (value - 0.5).ceil()
    } else {
        (value + 0.5).floor()
    };
    rounded.trunc() as i64
}

/// Whole months from `now` until `expiry`; negative once expired.
pub fn months_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (expiry - now).num_milliseconds() as f64 / 1000.0;
    round_half_away_from_zero(seconds / SECONDS_PER_MONTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn month() -> Duration {
        Duration::seconds(SECONDS_PER_MONTH as i64)
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_half_away_from_zero(2.5), 3);
        assert_eq!(round_half_away_from_zero(-2.5), -3);
        assert_eq!(round_half_away_from_zero(2.4), 2);
        assert_eq!(round_half_away_from_zero(0.5), 1);
        assert_eq!(round_half_away_from_zero(-0.5), -1);
    }

    #[test]
    fn test_round_below_half() {
        assert_eq!(round_half_away_from_zero(0.0), 0);
        assert_eq!(round_half_away_from_zero(0.49), 0);
        assert_eq!(round_half_away_from_zero(-0.49), 0);
        assert_eq!(round_half_away_from_zero(-2.4), -2);
        assert_eq!(round_half_away_from_zero(7.6), 8);
    }

    #[test]
    fn test_months_until() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        assert_eq!(months_until(now, now), 0);
        assert_eq!(months_until(now + month(), now), 1);
        assert_eq!(months_until(now + month() * 6, now), 6);
        assert_eq!(months_until(now - month() * 2, now), -2);
    }

    #[test]
    fn test_months_until_half_month() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let half = Duration::seconds((SECONDS_PER_MONTH / 2.0) as i64);

        assert_eq!(months_until(now + half, now), 1);
        assert_eq!(months_until(now - half, now), -1);
        assert_eq!(months_until(now + half - Duration::hours(1), now), 0);
    }
}
