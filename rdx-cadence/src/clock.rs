//! Wall-clock point arithmetic shared by schedules and the runner.
//!
//! A point in time is a `chrono::DateTime<Utc>`; this module provides the
//! handful of operations the rest of the crate needs on top of it. Like
//! interval arithmetic, point arithmetic saturates: falling off either end
//! of the representable range lands on a sentinel instead of panicking, so
//! an absurd schedule simply never comes due.

use chrono::{DateTime, TimeDelta, Utc};

use crate::interval::Interval;

/// The earliest representable point, used when arithmetic underflows.
pub const DISTANT_PAST: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// The latest representable point, used as the "never comes due" sentinel.
pub const DISTANT_FUTURE: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

/// The current wall-clock time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Adds an interval to a point, clamping to the sentinels on overflow.
pub fn add_interval(point: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let delta = TimeDelta::nanoseconds(interval.as_nanoseconds());
    match point.checked_add_signed(delta) {
        Some(shifted) => shifted,
        None if interval.is_negative() => DISTANT_PAST,
        None => DISTANT_FUTURE,
    }
}

/// The signed interval from `start` to `end`, saturating on overflow.
pub fn interval_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Interval {
    let delta = end.signed_duration_since(start);
    match delta.num_nanoseconds() {
        Some(nanos) => Interval::nanoseconds(nanos),
        None if delta.num_seconds() < 0 => Interval::MIN,
        None => Interval::MAX,
    }
}

/// Midnight at the start of the day `point` falls on.
pub fn start_of_day(point: DateTime<Utc>) -> DateTime<Utc> {
    match point.date_naive().and_hms_opt(0, 0, 0) {
        Some(midnight) => midnight.and_utc(),
        // Midnight always exists in UTC; keep the original point if chrono
        // ever disagrees.
        None => point,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_between_round_trip() {
        let base = now();
        let step = Interval::milliseconds(12_345);
        let shifted = add_interval(base, step);
        assert_eq!(interval_between(base, shifted), step);
        assert_eq!(interval_between(shifted, base), -step);
    }

    #[test]
    fn addition_clamps_to_the_sentinels() {
        let base = now();
        assert_eq!(
            add_interval(add_interval(base, Interval::MAX), Interval::MAX),
            DISTANT_FUTURE
        );
        assert_eq!(
            add_interval(add_interval(base, Interval::MIN), Interval::MIN),
            DISTANT_PAST
        );
    }

    #[test]
    fn between_saturates_across_the_whole_range() {
        assert_eq!(interval_between(DISTANT_PAST, DISTANT_FUTURE), Interval::MAX);
        assert_eq!(interval_between(DISTANT_FUTURE, DISTANT_PAST), Interval::MIN);
    }

    #[test]
    fn start_of_day_zeroes_the_time_of_day() {
        let base = now();
        let midnight = start_of_day(base);
        assert_eq!(midnight.date_naive(), base.date_naive());
        assert_eq!(midnight.time(), chrono::NaiveTime::MIN);
        assert!(midnight <= base);
    }
}
