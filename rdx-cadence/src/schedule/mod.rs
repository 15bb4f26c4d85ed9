//! Immutable schedule descriptions.
//!
//! A [`Schedule`] is a cheap-to-clone expression tree built from named
//! constructors (fixed intervals, date lists, calendar rules, period
//! phrases) and combinators (concat, merge, first, until, offset). It holds
//! no iteration state: [`Schedule::cursor`] mints a fresh
//! [`OffsetCursor`] each time, so one schedule can drive any number of
//! tasks started at different moments.
//!
//! Malformed input never panics. Constructors that parse text degrade to
//! [`Schedule::never`], which callers can detect with
//! [`Schedule::is_never`] before spawning a task.

mod cursor;

pub use cursor::OffsetCursor;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc, Weekday};

use crate::calendar::Monthday;
use crate::interval::Interval;
use crate::period::{Period, Vocabulary};
use crate::time::Time;

/// Extra offset applied per pull; `None` contributes nothing.
pub type OffsetFn = Arc<dyn Fn() -> Option<Interval> + Send + Sync>;

/// A lazy, reusable description of when something should happen.
///
/// # Examples
///
/// ```
/// use cadence::prelude::*;
///
/// let every_morning = Schedule::every_weekday(Weekday::Mon)
///     .merge(&Schedule::every_weekday(Weekday::Thu))
///     .at_time(Time::parse("6:30").unwrap());
/// assert!(!every_morning.is_never());
/// ```
#[derive(Clone)]
pub struct Schedule {
    kind: Arc<Kind>,
}

enum Kind {
    List(Vec<Interval>),
    Repeating {
        lead: Option<Interval>,
        gap: Interval,
    },
    Dates(Vec<DateTime<Utc>>),
    Weekday {
        day: Weekday,
        time: Option<Time>,
    },
    Monthday {
        pattern: Monthday,
        time: Option<Time>,
    },
    Period(Period),
    Concat(Schedule, Schedule),
    Merge(Schedule, Schedule),
    First(Schedule, usize),
    Until(Schedule, DateTime<Utc>),
    Offset(Schedule, OffsetFn),
}

impl Schedule {
    fn from_kind(kind: Kind) -> Self {
        Self {
            kind: Arc::new(kind),
        }
    }

    fn kind(&self) -> &Kind {
        &self.kind
    }

    /// A schedule that yields no offsets at all.
    pub fn never() -> Self {
        Self::from_kind(Kind::List(Vec::new()))
    }

    /// A finite schedule over an explicit list of offsets.
    pub fn of<I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = Interval>,
    {
        Self::from_kind(Kind::List(intervals.into_iter().collect()))
    }

    /// A finite schedule over explicit absolute dates, emitted in list
    /// order as offsets from a running previous pointer that starts at now.
    pub fn of_dates<I>(dates: I) -> Self
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        Self::from_kind(Kind::Dates(dates.into_iter().collect()))
    }

    /// Fires once at the given absolute date.
    pub fn at(date: DateTime<Utc>) -> Self {
        Self::from_kind(Kind::Dates(vec![date]))
    }

    /// Fires once after `delay`.
    pub fn after(delay: Interval) -> Self {
        Self::from_kind(Kind::List(vec![delay]))
    }

    /// Fires forever, every `gap`.
    pub fn every(gap: Interval) -> Self {
        Self::from_kind(Kind::Repeating { lead: None, gap })
    }

    /// Waits `delay` once, then fires every `gap` forever.
    pub fn after_repeating(delay: Interval, gap: Interval) -> Self {
        Self::from_kind(Kind::Repeating {
            lead: Some(delay),
            gap,
        })
    }

    /// Fires repeatedly, each occurrence one calendar period after the
    /// previous one. The sequence ends if the calendar cannot represent
    /// the next date.
    pub fn every_period(period: Period) -> Self {
        Self::from_kind(Kind::Period(period))
    }

    /// Parses a natural-language period phrase such as
    /// `"two hours and ten minutes"` and schedules it as
    /// [`Schedule::every_period`]. Malformed phrases yield
    /// [`Schedule::never`].
    pub fn every_phrase(text: &str, vocabulary: &Vocabulary) -> Self {
        match Period::parse(text, vocabulary) {
            Some(period) => Self::every_period(period),
            None => Self::never(),
        }
    }

    /// Fires weekly on the given weekday, at midnight unless a time of day
    /// is fused with [`Schedule::at_time`].
    pub fn every_weekday(day: Weekday) -> Self {
        Self::from_kind(Kind::Weekday { day, time: None })
    }

    /// Fires weekly on each of the given weekdays, combined by pairwise
    /// [`Schedule::merge`]. An empty list yields [`Schedule::never`].
    pub fn every_weekdays<I>(days: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        Self::merge_all(days.into_iter().map(Self::every_weekday))
    }

    /// Fires yearly on the given month-day, at midnight unless a time of
    /// day is fused with [`Schedule::at_time`].
    pub fn every_monthday(pattern: Monthday) -> Self {
        Self::from_kind(Kind::Monthday {
            pattern,
            time: None,
        })
    }

    /// Fires yearly on each of the given month-days, combined by pairwise
    /// [`Schedule::merge`]. An empty list yields [`Schedule::never`].
    pub fn every_monthdays<I>(patterns: I) -> Self
    where
        I: IntoIterator<Item = Monthday>,
    {
        Self::merge_all(patterns.into_iter().map(Self::every_monthday))
    }

    /// A single offset at the representable minimum.
    pub fn distant_past() -> Self {
        Self::from_kind(Kind::List(vec![Interval::MIN]))
    }

    /// A single offset at the representable maximum.
    pub fn distant_future() -> Self {
        Self::from_kind(Kind::List(vec![Interval::MAX]))
    }

    fn merge_all<I>(schedules: I) -> Self
    where
        I: Iterator<Item = Schedule>,
    {
        let mut merged: Option<Schedule> = None;
        for schedule in schedules {
            merged = Some(match merged {
                Some(accumulated) => accumulated.merge(&schedule),
                None => schedule,
            });
        }
        merged.unwrap_or_else(Self::never)
    }

    /// This schedule's offsets, then `other`'s.
    pub fn concat(&self, other: &Schedule) -> Schedule {
        Self::from_kind(Kind::Concat(self.clone(), other.clone()))
    }

    /// Interleaves both schedules by absolute date, earliest first. When
    /// both sides land on the same instant, this side's occurrence is
    /// emitted first and `other`'s follows with a zero offset.
    pub fn merge(&self, other: &Schedule) -> Schedule {
        Self::from_kind(Kind::Merge(self.clone(), other.clone()))
    }

    /// Truncates after `count` offsets.
    pub fn first(&self, count: usize) -> Schedule {
        Self::from_kind(Kind::First(self.clone(), count))
    }

    /// Truncates once an occurrence would reach or pass `deadline`.
    pub fn until(&self, deadline: DateTime<Utc>) -> Schedule {
        Self::from_kind(Kind::Until(self.clone(), deadline))
    }

    /// Shifts every offset by a fixed amount.
    pub fn offset(&self, amount: Interval) -> Schedule {
        self.offset_with(move || Some(amount))
    }

    /// Shifts every offset by a dynamic amount, re-evaluated on each pull.
    /// `None` leaves the offset unchanged.
    pub fn offset_with<F>(&self, offset: F) -> Schedule
    where
        F: Fn() -> Option<Interval> + Send + Sync + 'static,
    {
        Self::from_kind(Kind::Offset(self.clone(), Arc::new(offset)))
    }

    /// Fuses a time of day into this schedule's calendar rules.
    ///
    /// Applies to weekday and month-day schedules, including merges of
    /// them; the time lands on the first generated date and whole-unit
    /// advancement carries it forward. On any other schedule the result is
    /// [`Schedule::never`].
    pub fn at_time(&self, time: Time) -> Schedule {
        match self.fuse_time(time) {
            Some(fused) => fused,
            None => Self::never(),
        }
    }

    fn fuse_time(&self, time: Time) -> Option<Schedule> {
        match self.kind() {
            Kind::Weekday { day, .. } => Some(Self::from_kind(Kind::Weekday {
                day: *day,
                time: Some(time),
            })),
            Kind::Monthday { pattern, .. } => Some(Self::from_kind(Kind::Monthday {
                pattern: *pattern,
                time: Some(time),
            })),
            Kind::Merge(left, right) => {
                let left = left.fuse_time(time)?;
                let right = right.fuse_time(time)?;
                Some(left.merge(&right))
            }
            _ => None,
        }
    }

    /// A fresh cursor over this schedule's offsets.
    pub fn cursor(&self) -> OffsetCursor {
        OffsetCursor::new(self)
    }

    /// Whether this schedule produces no offsets at all.
    pub fn is_never(&self) -> bool {
        self.cursor().next().is_none()
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Kind::List(items) => f.debug_tuple("List").field(items).finish(),
            Kind::Repeating { lead, gap } => f
                .debug_struct("Repeating")
                .field("lead", lead)
                .field("gap", gap)
                .finish(),
            Kind::Dates(dates) => f.debug_tuple("Dates").field(dates).finish(),
            Kind::Weekday { day, time } => f
                .debug_struct("Weekday")
                .field("day", day)
                .field("time", time)
                .finish(),
            Kind::Monthday { pattern, time } => f
                .debug_struct("Monthday")
                .field("pattern", pattern)
                .field("time", time)
                .finish(),
            Kind::Period(period) => f.debug_tuple("Period").field(period).finish(),
            Kind::Concat(head, tail) => f.debug_tuple("Concat").field(head).field(tail).finish(),
            Kind::Merge(left, right) => f.debug_tuple("Merge").field(left).field(right).finish(),
            Kind::First(inner, count) => f.debug_tuple("First").field(inner).field(count).finish(),
            Kind::Until(inner, deadline) => {
                f.debug_tuple("Until").field(inner).field(deadline).finish()
            }
            Kind::Offset(inner, _) => f.debug_tuple("Offset").field(inner).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;

    #[test]
    fn never_yields_nothing() {
        assert!(Schedule::never().is_never());
        assert_eq!(Schedule::never().cursor().next(), None);
    }

    #[test]
    fn empty_inputs_collapse_to_never() {
        assert!(Schedule::of([]).is_never());
        assert!(Schedule::of_dates([]).is_never());
        assert!(Schedule::every_weekdays([]).is_never());
        assert!(Schedule::every_monthdays([]).is_never());
    }

    #[test]
    fn fixed_interval_first_n_yields_exactly_n_copies() {
        let schedule = Schedule::every(Interval::seconds(2)).first(3);
        let offsets: Vec<Interval> = schedule.cursor().collect();
        assert_eq!(offsets, vec![Interval::seconds(2); 3]);
    }

    #[test]
    fn first_zero_is_never() {
        assert!(Schedule::every(Interval::seconds(1)).first(0).is_never());
    }

    #[test]
    fn after_fires_exactly_once() {
        let schedule = Schedule::after(Interval::seconds(1));
        let offsets: Vec<Interval> = schedule.cursor().collect();
        assert_eq!(offsets, vec![Interval::seconds(1)]);
    }

    #[test]
    fn after_repeating_leads_then_repeats() {
        let schedule =
            Schedule::after_repeating(Interval::seconds(9), Interval::seconds(1)).first(3);
        let offsets: Vec<Interval> = schedule.cursor().collect();
        assert_eq!(
            offsets,
            vec![
                Interval::seconds(9),
                Interval::seconds(1),
                Interval::seconds(1),
            ]
        );
    }

    #[test]
    fn at_fires_once_at_the_date() {
        let date = clock::add_interval(clock::now(), Interval::minutes(5));
        let schedule = Schedule::at(date);
        let offsets: Vec<Interval> = schedule.cursor().collect();
        assert_eq!(offsets.len(), 1);
        assert!((offsets[0] - Interval::minutes(5)).abs() < Interval::seconds(1));
    }

    #[test]
    fn phrases_parse_into_period_schedules() {
        let vocabulary = Vocabulary::standard();
        let schedule = Schedule::every_phrase("two hours and ten minutes", &vocabulary);
        assert!(!schedule.is_never());
    }

    #[test]
    fn malformed_phrases_degrade_to_never() {
        let vocabulary = Vocabulary::standard();
        assert!(Schedule::every_phrase("", &vocabulary).is_never());
        assert!(Schedule::every_phrase("soonish", &vocabulary).is_never());
    }

    #[test]
    fn at_time_on_non_calendar_schedules_is_never() {
        let time = Time::parse("6:30").unwrap();
        assert!(Schedule::every(Interval::seconds(1)).at_time(time).is_never());
        assert!(Schedule::after(Interval::seconds(1)).at_time(time).is_never());
        assert!(Schedule::every_period(Period::days(1)).at_time(time).is_never());
    }

    #[test]
    fn at_time_reaches_through_merged_calendar_rules() {
        let time = Time::parse("6:30").unwrap();
        let schedule =
            Schedule::every_weekdays([Weekday::Mon, Weekday::Wed, Weekday::Fri]).at_time(time);
        assert!(!schedule.is_never());
    }

    #[test]
    fn distant_extremes_emit_one_saturated_offset() {
        let past: Vec<Interval> = Schedule::distant_past().cursor().collect();
        assert_eq!(past, vec![Interval::MIN]);
        let future: Vec<Interval> = Schedule::distant_future().cursor().collect();
        assert_eq!(future, vec![Interval::MAX]);
    }

    #[test]
    fn schedules_are_cheap_to_clone_and_share() {
        let schedule = Schedule::every(Interval::seconds(1)).first(2);
        let clone = schedule.clone();
        assert_eq!(schedule.cursor().count(), 2);
        assert_eq!(clone.cursor().count(), 2);
    }
}
