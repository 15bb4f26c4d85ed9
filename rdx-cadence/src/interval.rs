//! A signed, nanosecond-resolution length of time.
//!
//! `Interval` is the currency every schedule trades in: an offset sequence
//! is nothing but a stream of intervals, and the runner arms its timer with
//! one at a time. All arithmetic saturates at the representable bounds
//! instead of wrapping or panicking, so a schedule pointed three hundred
//! years into the future stays inert rather than crashing its owner.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

const NANOS_PER_MICROSECOND: i64 = 1_000;
const NANOS_PER_MILLISECOND: i64 = 1_000_000;
const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;
const NANOS_PER_WEEK: i64 = 7 * NANOS_PER_DAY;

/// A signed length of time with nanosecond resolution.
///
/// Equality and ordering are defined on the underlying nanosecond count,
/// which gives a strict total order. The type is `Copy` and immutable; any
/// operation returns a new value.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Interval {
    nanoseconds: i64,
}

impl Interval {
    /// The zero-length interval.
    pub const ZERO: Interval = Interval { nanoseconds: 0 };

    /// The most negative representable interval.
    pub const MIN: Interval = Interval {
        nanoseconds: i64::MIN,
    };

    /// The largest representable interval, roughly 292 years.
    pub const MAX: Interval = Interval {
        nanoseconds: i64::MAX,
    };

    pub const fn nanoseconds(count: i64) -> Self {
        Self { nanoseconds: count }
    }

    pub const fn microseconds(count: i64) -> Self {
        Self::nanoseconds(count.saturating_mul(NANOS_PER_MICROSECOND))
    }

    pub const fn milliseconds(count: i64) -> Self {
        Self::nanoseconds(count.saturating_mul(NANOS_PER_MILLISECOND))
    }

    pub const fn seconds(count: i64) -> Self {
        Self::nanoseconds(count.saturating_mul(NANOS_PER_SECOND))
    }

    pub const fn minutes(count: i64) -> Self {
        Self::nanoseconds(count.saturating_mul(NANOS_PER_MINUTE))
    }

    pub const fn hours(count: i64) -> Self {
        Self::nanoseconds(count.saturating_mul(NANOS_PER_HOUR))
    }

    pub const fn days(count: i64) -> Self {
        Self::nanoseconds(count.saturating_mul(NANOS_PER_DAY))
    }

    pub const fn weeks(count: i64) -> Self {
        Self::nanoseconds(count.saturating_mul(NANOS_PER_WEEK))
    }

    /// The raw nanosecond count.
    pub const fn as_nanoseconds(self) -> i64 {
        self.nanoseconds
    }

    /// Whole microseconds, truncated toward zero.
    pub const fn as_microseconds(self) -> i64 {
        self.nanoseconds / NANOS_PER_MICROSECOND
    }

    /// Whole milliseconds, truncated toward zero.
    pub const fn as_milliseconds(self) -> i64 {
        self.nanoseconds / NANOS_PER_MILLISECOND
    }

    /// Whole seconds, truncated toward zero.
    pub const fn as_seconds(self) -> i64 {
        self.nanoseconds / NANOS_PER_SECOND
    }

    pub const fn as_minutes(self) -> i64 {
        self.nanoseconds / NANOS_PER_MINUTE
    }

    pub const fn as_hours(self) -> i64 {
        self.nanoseconds / NANOS_PER_HOUR
    }

    pub const fn as_days(self) -> i64 {
        self.nanoseconds / NANOS_PER_DAY
    }

    pub const fn as_weeks(self) -> i64 {
        self.nanoseconds / NANOS_PER_WEEK
    }

    /// Seconds as a float, for display and tolerance math.
    pub fn as_seconds_f64(self) -> f64 {
        self.nanoseconds as f64 / NANOS_PER_SECOND as f64
    }

    pub const fn is_negative(self) -> bool {
        self.nanoseconds < 0
    }

    pub const fn is_zero(self) -> bool {
        self.nanoseconds == 0
    }

    /// The magnitude of this interval. `MIN` saturates to `MAX`.
    pub const fn abs(self) -> Self {
        Self::nanoseconds(self.nanoseconds.saturating_abs())
    }

    /// Saturating addition.
    pub const fn saturating_add(self, other: Self) -> Self {
        Self::nanoseconds(self.nanoseconds.saturating_add(other.nanoseconds))
    }

    /// Saturating subtraction.
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self::nanoseconds(self.nanoseconds.saturating_sub(other.nanoseconds))
    }

    /// Converts to a `std::time::Duration` for handing to the timer.
    ///
    /// Negative intervals clamp to zero: a timer armed with an elapsed
    /// deadline fires as soon as possible rather than being dropped.
    pub const fn to_std(self) -> std::time::Duration {
        if self.nanoseconds <= 0 {
            std::time::Duration::ZERO
        } else {
            std::time::Duration::from_nanos(self.nanoseconds as u64)
        }
    }
}

impl Add for Interval {
    type Output = Interval;

    fn add(self, rhs: Interval) -> Interval {
        self.saturating_add(rhs)
    }
}

impl Sub for Interval {
    type Output = Interval;

    fn sub(self, rhs: Interval) -> Interval {
        self.saturating_sub(rhs)
    }
}

impl Neg for Interval {
    type Output = Interval;

    fn neg(self) -> Interval {
        Interval::nanoseconds(self.nanoseconds.checked_neg().unwrap_or(i64::MAX))
    }
}

impl Mul<i64> for Interval {
    type Output = Interval;

    fn mul(self, rhs: i64) -> Interval {
        Interval::nanoseconds(self.nanoseconds.saturating_mul(rhs))
    }
}

impl From<std::time::Duration> for Interval {
    fn from(duration: std::time::Duration) -> Self {
        let nanos = duration.as_nanos();
        Interval::nanoseconds(i64::try_from(nanos).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.nanoseconds.saturating_abs();
        if magnitude < NANOS_PER_MICROSECOND {
            write!(f, "{}ns", self.nanoseconds)
        } else if magnitude < NANOS_PER_MILLISECOND {
            write!(f, "{}us", self.as_microseconds())
        } else if magnitude < NANOS_PER_SECOND {
            write!(f, "{}ms", self.as_milliseconds())
        } else {
            write!(f, "{}s", self.as_seconds_f64())
        }
    }
}
