//! Calendar lookups backing the weekday, month-day and period schedules.
//!
//! Everything here is a thin collaborator over `chrono`: match a point
//! against a pattern, find the next occurrence of a pattern after a point,
//! or add a [`Period`]'s fields to a point. Operations return `Option`
//! when the calendar cannot produce a date; callers decide whether that
//! ends a sequence or degrades to a sentinel.

use chrono::{DateTime, Datelike, Days, Month, Months, TimeDelta, Utc, Weekday};

use crate::clock;
use crate::period::Period;

/// A day-of-month pattern such as "June 14th".
///
/// Construction validates the day against the month's maximum possible
/// length (Feb 29 is allowed, it resolves to leap years), so a `Monthday`
/// always names at least one real date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Monthday {
    month: Month,
    day: u32,
}

impl Monthday {
    /// Builds a month-day pattern, or `None` when the day can never occur
    /// in that month (e.g. February 30th).
    pub fn new(month: Month, day: u32) -> Option<Self> {
        if day == 0 || day > max_day_in(month) {
            return None;
        }
        Some(Self { month, day })
    }

    pub const fn month(self) -> Month {
        self.month
    }

    pub const fn day(self) -> u32 {
        self.day
    }
}

impl std::fmt::Display for Monthday {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.month.name(), self.day)
    }
}

fn max_day_in(month: Month) -> u32 {
    match month {
        Month::February => 29,
        Month::April | Month::June | Month::September | Month::November => 30,
        _ => 31,
    }
}

/// Whether `point` falls on the given weekday.
pub fn matches_weekday(point: DateTime<Utc>, weekday: Weekday) -> bool {
    point.weekday() == weekday
}

/// Whether `point` falls on the given month-day.
pub fn matches_monthday(point: DateTime<Utc>, monthday: Monthday) -> bool {
    point.month() == monthday.month.number_from_month() && point.day() == monthday.day
}

/// Midnight starting the next day after `point` that falls on `weekday`.
///
/// "Next" is strict: if `point` is already that weekday, the result is one
/// week out. Returns `None` only when the calendar range is exhausted.
pub fn next_weekday_after(point: DateTime<Utc>, weekday: Weekday) -> Option<DateTime<Utc>> {
    let today = clock::start_of_day(point);
    for offset in 1..=7 {
        let candidate = today.checked_add_days(Days::new(offset))?;
        if candidate.weekday() == weekday {
            return Some(candidate);
        }
    }
    None
}

/// Midnight starting the next date after `point` matching `monthday`.
///
/// Strictly after `point`'s own day. February 29th resolves to the next
/// leap year, which is never more than eight years out.
pub fn next_monthday_after(point: DateTime<Utc>, monthday: Monthday) -> Option<DateTime<Utc>> {
    let today = point.date_naive();
    let month = monthday.month.number_from_month();
    for extra_years in 0..=8i32 {
        let year = today.year().checked_add(extra_years)?;
        let Some(candidate) = chrono::NaiveDate::from_ymd_opt(year, month, monthday.day) else {
            continue;
        };
        if candidate > today {
            return candidate.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

/// Adds a period's fields to a point: years and months first (month-end
/// aware), then whole days, then the exact sub-day remainder.
pub fn add_period(point: DateTime<Utc>, period: &Period) -> Option<DateTime<Utc>> {
    let months = period.years.checked_mul(12)?.checked_add(period.months)?;
    let shifted = if months >= 0 {
        point.checked_add_months(Months::new(u32::try_from(months).ok()?))?
    } else {
        point.checked_sub_months(Months::new(u32::try_from(-months).ok()?))?
    };

    let shifted = if period.days >= 0 {
        shifted.checked_add_days(Days::new(u64::try_from(period.days).ok()?))?
    } else {
        shifted.checked_sub_days(Days::new(u64::try_from(-period.days).ok()?))?
    };

    let seconds = period
        .hours
        .checked_mul(3600)?
        .checked_add(period.minutes.checked_mul(60)?)?
        .checked_add(period.seconds)?;
    let remainder = TimeDelta::try_seconds(seconds)?
        .checked_add(&TimeDelta::nanoseconds(period.nanoseconds))?;
    shifted.checked_add_signed(remainder)
}
