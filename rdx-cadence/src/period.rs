//! Field-based calendar durations and the phrase vocabulary.
//!
//! An [`Interval`] is an exact nanosecond count; a [`Period`] is the
//! calendar-shaped cousin: "1 month" lands on the same day of the next
//! month (clamped to month end), however long that month happens to be.
//! Periods can be written out field by field or parsed from a phrase like
//! `"1 year, 2 months and 3 days"` through a [`Vocabulary`].

use std::collections::HashMap;
use std::fmt;
use std::ops::Add;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::calendar;
use crate::clock;
use crate::interval::Interval;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A signed, seven-field calendar duration.
///
/// Fields are independent and may be negative; nothing is normalized until
/// [`Period::tidied`] is asked to carry finer fields upward. Addition is
/// field-wise and saturates per field.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Period {
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub nanoseconds: i64,
}

/// The coarsest field [`Period::tidied`] is allowed to carry into.
///
/// Months and years are never produced by tidying because their length is
/// variable; `Day` is the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TidyUnit {
    Nanosecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl Period {
    /// The all-zero period.
    pub const ZERO: Period = Period {
        years: 0,
        months: 0,
        days: 0,
        hours: 0,
        minutes: 0,
        seconds: 0,
        nanoseconds: 0,
    };

    pub const fn years(count: i64) -> Self {
        Period { years: count, ..Self::ZERO }
    }

    pub const fn months(count: i64) -> Self {
        Period { months: count, ..Self::ZERO }
    }

    /// Weeks have no field of their own; a week is exactly seven days.
    pub const fn weeks(count: i64) -> Self {
        Period::days(count.saturating_mul(7))
    }

    pub const fn days(count: i64) -> Self {
        Period { days: count, ..Self::ZERO }
    }

    pub const fn hours(count: i64) -> Self {
        Period { hours: count, ..Self::ZERO }
    }

    pub const fn minutes(count: i64) -> Self {
        Period { minutes: count, ..Self::ZERO }
    }

    pub const fn seconds(count: i64) -> Self {
        Period { seconds: count, ..Self::ZERO }
    }

    pub const fn nanoseconds(count: i64) -> Self {
        Period { nanoseconds: count, ..Self::ZERO }
    }

    /// Parses a phrase like `"1 year, 2 months and 3 days"`.
    ///
    /// Quantity words come from the vocabulary (`"two hours"` works out of
    /// the box with [`Vocabulary::standard`]); unit nouns may be singular
    /// or plural; segments are joined by `", "` or `" and "`. Segments that
    /// fail to parse are skipped silently; a phrase with no parseable
    /// segment at all yields `None`.
    pub fn parse(text: &str, vocabulary: &Vocabulary) -> Option<Period> {
        let lowered = text.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        let normalized = vocabulary.replace_quantifiers(&lowered);

        let mut period = Period::ZERO;
        let mut matched = false;
        for segment in normalized.split(", ").flat_map(|part| part.split(" and ")) {
            let Some(captures) = vocabulary.segment.captures(segment) else {
                continue;
            };
            let Ok(count) = captures[1].parse::<i64>() else {
                continue;
            };
            let unit = &captures[2];
            let singular = unit.strip_suffix('s').unwrap_or(unit);
            let contribution = match singular {
                "year" => Period::years(count),
                "month" => Period::months(count),
                "week" => Period::weeks(count),
                "day" => Period::days(count),
                "hour" => Period::hours(count),
                "minute" => Period::minutes(count),
                "second" => Period::seconds(count),
                "nanosecond" => Period::nanoseconds(count),
                _ => continue,
            };
            period = period + contribution;
            matched = true;
        }
        matched.then_some(period)
    }

    /// Carries overflow from finer fields into coarser ones, stopping at
    /// `unit`. Ratios are fixed (10⁹ ns/s, 60 s/min, 60 min/h, 24 h/day);
    /// months and years are left alone because their length varies.
    /// Idempotent for any fixed `unit`.
    pub fn tidied(self, unit: TidyUnit) -> Period {
        let mut period = self;
        if unit >= TidyUnit::Second {
            period.seconds = period
                .seconds
                .saturating_add(period.nanoseconds / NANOS_PER_SECOND);
            period.nanoseconds %= NANOS_PER_SECOND;
        }
        if unit >= TidyUnit::Minute {
            period.minutes = period.minutes.saturating_add(period.seconds / 60);
            period.seconds %= 60;
        }
        if unit >= TidyUnit::Hour {
            period.hours = period.hours.saturating_add(period.minutes / 60);
            period.minutes %= 60;
        }
        if unit >= TidyUnit::Day {
            period.days = period.days.saturating_add(period.hours / 24);
            period.hours %= 24;
        }
        period
    }

    /// Folds an exact interval into the nanoseconds field, then tidies up
    /// to days.
    pub fn add_interval(self, interval: Interval) -> Period {
        let mut period = self;
        period.nanoseconds = period.nanoseconds.saturating_add(interval.as_nanoseconds());
        period.tidied(TidyUnit::Day)
    }

    /// Applies this period to a point via calendar arithmetic.
    ///
    /// When the calendar cannot represent the result the sentinel
    /// [`clock::DISTANT_FUTURE`] is returned, so a broken chain degrades to
    /// "never comes due" instead of failing.
    pub fn apply_to(self, point: DateTime<Utc>) -> DateTime<Utc> {
        calendar::add_period(point, &self).unwrap_or(clock::DISTANT_FUTURE)
    }

    pub fn is_zero(self) -> bool {
        self == Period::ZERO
    }
}

impl Add for Period {
    type Output = Period;

    fn add(self, rhs: Period) -> Period {
        Period {
            years: self.years.saturating_add(rhs.years),
            months: self.months.saturating_add(rhs.months),
            days: self.days.saturating_add(rhs.days),
            hours: self.hours.saturating_add(rhs.hours),
            minutes: self.minutes.saturating_add(rhs.minutes),
            seconds: self.seconds.saturating_add(rhs.seconds),
            nanoseconds: self.nanoseconds.saturating_add(rhs.nanoseconds),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            (self.years, "year"),
            (self.months, "month"),
            (self.days, "day"),
            (self.hours, "hour"),
            (self.minutes, "minute"),
            (self.seconds, "second"),
            (self.nanoseconds, "nanosecond"),
        ];
        let mut wrote = false;
        for (count, unit) in fields {
            if count == 0 {
                continue;
            }
            if wrote {
                write!(f, " ")?;
            }
            let plural = if count.abs() == 1 { "" } else { "s" };
            write!(f, "{count} {unit}{plural}")?;
            wrote = true;
        }
        if !wrote {
            write!(f, "0 seconds")?;
        }
        Ok(())
    }
}

/// The quantity-word table the phrase parser resolves against.
///
/// There is deliberately no process-wide default: construct one (usually
/// [`Vocabulary::standard`]), share it behind an `Arc` if several parsers
/// need it, and tests get isolated tables for free. Registration is safe
/// from any thread.
pub struct Vocabulary {
    quantifiers: RwLock<HashMap<String, i64>>,
    segment: Regex,
}

impl Vocabulary {
    /// The built-in table: `"one"` through `"twelve"`.
    pub fn standard() -> Self {
        let defaults = [
            ("one", 1),
            ("two", 2),
            ("three", 3),
            ("four", 4),
            ("five", 5),
            ("six", 6),
            ("seven", 7),
            ("eight", 8),
            ("nine", 9),
            ("ten", 10),
            ("eleven", 11),
            ("twelve", 12),
        ];
        let quantifiers = defaults
            .into_iter()
            .map(|(word, value)| (word.to_string(), value))
            .collect();
        Self {
            quantifiers: RwLock::new(quantifiers),
            // The pattern is a compile-time constant; it cannot fail to
            // build.
            segment: Regex::new(r"^\s*(\d+)\s*([a-z]+)\s*$").expect("segment pattern compiles"),
        }
    }

    /// Registers an extra quantity word, e.g. `("dozen", 12)`.
    pub fn register(&self, word: impl Into<String>, value: i64) {
        self.quantifiers
            .write()
            .insert(word.into().to_lowercase(), value);
    }

    /// Rewrites registered quantity words as digits. Only whole
    /// space-separated tokens are rewritten, so a word embedded in another
    /// token ("nine" inside "ninety") is left alone.
    fn replace_quantifiers(&self, text: &str) -> String {
        let table = self.quantifiers.read();
        text.split(' ')
            .map(|token| match table.get(token) {
                Some(value) => value.to_string(),
                None => token.to_string(),
            })
            .collect::<Vec<String>>()
            .join(" ")
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tidy_carries_through_fixed_ratios() {
        let period = Period {
            hours: 25,
            minutes: 61,
            seconds: 90,
            nanoseconds: 2 * NANOS_PER_SECOND + 5,
            ..Period::ZERO
        };
        let tidy = period.tidied(TidyUnit::Day);
        assert_eq!(tidy.days, 1);
        assert_eq!(tidy.hours, 2);
        assert_eq!(tidy.minutes, 2);
        assert_eq!(tidy.seconds, 32);
        assert_eq!(tidy.nanoseconds, 5);
    }

    #[test]
    fn tidy_stops_at_the_requested_unit() {
        let period = Period {
            minutes: 90,
            seconds: 75,
            ..Period::ZERO
        };
        let tidy = period.tidied(TidyUnit::Minute);
        // Seconds carried into minutes, but minutes left untouched.
        assert_eq!(tidy.minutes, 91);
        assert_eq!(tidy.seconds, 15);
        assert_eq!(tidy.hours, 0);
    }

    #[test]
    fn tidy_never_touches_months_or_years() {
        let period = Period {
            months: 26,
            days: 400,
            ..Period::ZERO
        };
        let tidy = period.tidied(TidyUnit::Day);
        assert_eq!(tidy.months, 26);
        assert_eq!(tidy.days, 400);
    }

    #[test]
    fn tidy_is_idempotent() {
        let period = Period {
            hours: 49,
            minutes: 200,
            seconds: -90,
            nanoseconds: 3_999_999_999,
            ..Period::ZERO
        };
        let once = period.tidied(TidyUnit::Day);
        assert_eq!(once.tidied(TidyUnit::Day), once);
    }

    #[test]
    fn tidy_keeps_signs_consistent() {
        let period = Period {
            seconds: -90,
            ..Period::ZERO
        };
        let tidy = period.tidied(TidyUnit::Minute);
        assert_eq!(tidy.minutes, -1);
        assert_eq!(tidy.seconds, -30);
    }

    #[test]
    fn addition_is_field_wise_and_saturating() {
        let sum = Period::years(1) + Period::months(14) + Period::months(i64::MAX);
        assert_eq!(sum.years, 1);
        assert_eq!(sum.months, i64::MAX);
    }

    #[test]
    fn add_interval_folds_and_tidies() {
        let period = Period::minutes(1).add_interval(Interval::seconds(90));
        assert_eq!(period.minutes, 2);
        assert_eq!(period.seconds, 30);
        assert_eq!(period.nanoseconds, 0);
    }

    #[test]
    fn parses_the_canonical_phrases() {
        let vocabulary = Vocabulary::standard();
        let period = Period::parse("two hours and ten minutes", &vocabulary).unwrap();
        assert_eq!(period.hours, 2);
        assert_eq!(period.minutes, 10);

        let period = Period::parse("1 year, 2 months and 3 days", &vocabulary).unwrap();
        assert_eq!((period.years, period.months, period.days), (1, 2, 3));
    }

    #[test]
    fn parses_weeks_as_seven_days() {
        let vocabulary = Vocabulary::standard();
        let period = Period::parse("one week", &vocabulary).unwrap();
        assert_eq!(period.days, 7);
    }

    #[test]
    fn unknown_segments_are_skipped_silently() {
        let vocabulary = Vocabulary::standard();
        let period = Period::parse("3 parsecs and 2 hours", &vocabulary).unwrap();
        assert_eq!(period.hours, 2);
        assert_eq!(period.days, 0);
    }

    #[test]
    fn phrases_with_nothing_usable_are_rejected() {
        let vocabulary = Vocabulary::standard();
        assert!(Period::parse("", &vocabulary).is_none());
        assert!(Period::parse("   ", &vocabulary).is_none());
        assert!(Period::parse("soon", &vocabulary).is_none());
        assert!(Period::parse("3 parsecs", &vocabulary).is_none());
    }

    #[test]
    fn registered_quantifiers_take_effect() {
        let vocabulary = Vocabulary::standard();
        vocabulary.register("dozen", 12);
        let period = Period::parse("dozen days and two hours", &vocabulary).unwrap();
        assert_eq!(period.days, 12);
        assert_eq!(period.hours, 2);
    }

    #[test]
    fn quantity_words_rewrite_whole_tokens_only() {
        let vocabulary = Vocabulary::standard();
        // "ninety" embeds "nine" but is not itself registered.
        assert!(Period::parse("ninety days", &vocabulary).is_none());
        let period = Period::parse("nine days and ninety hours", &vocabulary).unwrap();
        assert_eq!(period.days, 9);
        assert_eq!(period.hours, 0);
    }

    #[test]
    fn registered_words_cannot_corrupt_unit_nouns() {
        let vocabulary = Vocabulary::standard();
        // "our" is embedded in "hours"; the unit noun must survive.
        vocabulary.register("our", 4);
        let period = Period::parse("two hours", &vocabulary).unwrap();
        assert_eq!(period.hours, 2);
    }

    #[test]
    fn parsing_is_case_insensitive() {
        let vocabulary = Vocabulary::standard();
        let period = Period::parse("Two Hours", &vocabulary).unwrap();
        assert_eq!(period.hours, 2);
    }

    #[test]
    fn apply_to_degrades_to_the_sentinel() {
        let applied = Period::months(1).apply_to(clock::DISTANT_FUTURE);
        assert_eq!(applied, clock::DISTANT_FUTURE);
    }

    #[test]
    fn display_lists_non_zero_fields() {
        let period = Period::years(1) + Period::days(3);
        assert_eq!(period.to_string(), "1 year 3 days");
        assert_eq!(Period::ZERO.to_string(), "0 seconds");
    }
}
