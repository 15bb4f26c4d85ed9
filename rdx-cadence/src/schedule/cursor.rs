//! Lazy, restartable cursors over schedule expressions.
//!
//! Every call to [`Schedule::cursor`](super::Schedule::cursor) mints an
//! independent cursor; all per-iteration state lives here, never in the
//! schedule itself. Calendar-anchored cursors snapshot "now" on their first
//! pull, so the same schedule value can back several tasks started at
//! different real times and each sees offsets relative to its own start.

use chrono::{DateTime, Days, Months, Utc, Weekday};

use crate::calendar::{self, Monthday};
use crate::clock;
use crate::interval::Interval;
use crate::period::Period;
use crate::time::Time;

use super::{Kind, OffsetFn, Schedule};

/// A single pass over one schedule's offsets.
///
/// Yields the wait before each fire, relative to the previous one. Finite
/// schedules return `None` when exhausted and stay exhausted.
pub struct OffsetCursor {
    state: State,
}

enum State {
    List {
        items: Vec<Interval>,
        index: usize,
    },
    Repeating {
        lead: Option<Interval>,
        gap: Interval,
    },
    Dates {
        dates: Vec<DateTime<Utc>>,
        index: usize,
        position: Option<DateTime<Utc>>,
    },
    Calendar(CalendarCursor),
    Concat {
        head: Box<OffsetCursor>,
        tail: Box<OffsetCursor>,
        on_tail: bool,
    },
    Merge(Box<MergeCursor>),
    First {
        inner: Box<OffsetCursor>,
        remaining: usize,
    },
    Until {
        inner: Box<OffsetCursor>,
        deadline: DateTime<Utc>,
        position: Option<DateTime<Utc>>,
        done: bool,
    },
    Offset {
        inner: Box<OffsetCursor>,
        extra: OffsetFn,
    },
}

impl OffsetCursor {
    pub(super) fn new(schedule: &Schedule) -> Self {
        let state = match schedule.kind() {
            Kind::List(items) => State::List {
                items: items.clone(),
                index: 0,
            },
            Kind::Repeating { lead, gap } => State::Repeating {
                lead: *lead,
                gap: *gap,
            },
            Kind::Dates(dates) => State::Dates {
                dates: dates.clone(),
                index: 0,
                position: None,
            },
            Kind::Weekday { day, time } => {
                State::Calendar(CalendarCursor::new(Pattern::Weekday(*day), *time))
            }
            Kind::Monthday { pattern, time } => {
                State::Calendar(CalendarCursor::new(Pattern::Monthday(*pattern), *time))
            }
            Kind::Period(period) => {
                State::Calendar(CalendarCursor::new(Pattern::Period(*period), None))
            }
            Kind::Concat(head, tail) => State::Concat {
                head: Box::new(head.cursor()),
                tail: Box::new(tail.cursor()),
                on_tail: false,
            },
            Kind::Merge(left, right) => State::Merge(Box::new(MergeCursor::new(
                left.cursor(),
                right.cursor(),
            ))),
            Kind::First(inner, count) => State::First {
                inner: Box::new(inner.cursor()),
                remaining: *count,
            },
            Kind::Until(inner, deadline) => State::Until {
                inner: Box::new(inner.cursor()),
                deadline: *deadline,
                position: None,
                done: false,
            },
            Kind::Offset(inner, extra) => State::Offset {
                inner: Box::new(inner.cursor()),
                extra: extra.clone(),
            },
        };
        Self { state }
    }
}

impl Iterator for OffsetCursor {
    type Item = Interval;

    fn next(&mut self) -> Option<Interval> {
        match &mut self.state {
            State::List { items, index } => {
                let item = items.get(*index).copied()?;
                *index += 1;
                Some(item)
            }
            State::Repeating { lead, gap } => Some(lead.take().unwrap_or(*gap)),
            State::Dates {
                dates,
                index,
                position,
            } => {
                let date = dates.get(*index).copied()?;
                *index += 1;
                // Offsets run date-to-date; the chain starts at now.
                let reference = position.unwrap_or_else(clock::now);
                *position = Some(date);
                Some(clock::interval_between(reference, date))
            }
            State::Calendar(calendar) => calendar.next_offset(),
            State::Concat { head, tail, on_tail } => {
                if !*on_tail {
                    if let Some(offset) = head.next() {
                        return Some(offset);
                    }
                    *on_tail = true;
                }
                tail.next()
            }
            State::Merge(merge) => merge.next_offset(),
            State::First { inner, remaining } => {
                if *remaining == 0 {
                    return None;
                }
                let offset = inner.next()?;
                *remaining -= 1;
                Some(offset)
            }
            State::Until {
                inner,
                deadline,
                position,
                done,
            } => {
                if *done {
                    return None;
                }
                let offset = inner.next()?;
                let reference = position.unwrap_or_else(clock::now);
                let date = clock::add_interval(reference, offset);
                if date >= *deadline {
                    *done = true;
                    return None;
                }
                *position = Some(date);
                Some(offset)
            }
            State::Offset { inner, extra } => {
                let offset = inner.next()?;
                let shift = (**extra)().unwrap_or(Interval::ZERO);
                Some(offset.saturating_add(shift))
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Pattern {
    Weekday(Weekday),
    Monthday(Monthday),
    Period(Period),
}

/// Date generator for the weekday, month-day and period schedules.
///
/// The first pull resolves the pattern against the current moment; later
/// pulls advance the previous date by exactly one unit of the pattern, so
/// recurrence never drifts through repeated nearest-match queries. A fused
/// time of day lands on the first date only; advancement preserves it.
struct CalendarCursor {
    pattern: Pattern,
    time: Option<Time>,
    position: Option<DateTime<Utc>>,
    done: bool,
}

impl CalendarCursor {
    fn new(pattern: Pattern, time: Option<Time>) -> Self {
        Self {
            pattern,
            time,
            position: None,
            done: false,
        }
    }

    fn next_offset(&mut self) -> Option<Interval> {
        if self.done {
            return None;
        }
        let reference = match self.position {
            Some(position) => position,
            None => clock::now(),
        };
        let Some(date) = self.next_date(reference) else {
            self.done = true;
            return None;
        };
        self.position = Some(date);
        Some(clock::interval_between(reference, date))
    }

    fn next_date(&self, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match (self.pattern, self.position) {
            (Pattern::Weekday(day), None) => {
                let base = if calendar::matches_weekday(reference, day) {
                    clock::start_of_day(reference)
                } else {
                    calendar::next_weekday_after(reference, day)?
                };
                Some(self.fuse_time(base))
            }
            (Pattern::Weekday(_), Some(position)) => position.checked_add_days(Days::new(7)),
            (Pattern::Monthday(pattern), None) => {
                let base = if calendar::matches_monthday(reference, pattern) {
                    clock::start_of_day(reference)
                } else {
                    calendar::next_monthday_after(reference, pattern)?
                };
                Some(self.fuse_time(base))
            }
            (Pattern::Monthday(_), Some(position)) => {
                position.checked_add_months(Months::new(12))
            }
            (Pattern::Period(period), _) => {
                // A period that does not move the date forward ends the
                // sequence.
                let date = calendar::add_period(reference, &period)?;
                (date > reference).then_some(date)
            }
        }
    }

    fn fuse_time(&self, midnight: DateTime<Utc>) -> DateTime<Utc> {
        match self.time {
            Some(time) => clock::add_interval(midnight, time.interval_since_midnight()),
            None => midnight,
        }
    }
}

/// Simultaneous-date interleave of two offset streams.
///
/// Both sides are lifted to absolute-date streams anchored at the same
/// first-pull moment, one pending date is buffered per side, and each pull
/// emits the earlier buffer. Equal dates favor the left stream; the right
/// one follows on the next pull with a zero offset.
struct MergeCursor {
    left: DatedCursor,
    right: DatedCursor,
    left_pending: Option<DateTime<Utc>>,
    right_pending: Option<DateTime<Utc>>,
    position: Option<DateTime<Utc>>,
}

impl MergeCursor {
    fn new(left: OffsetCursor, right: OffsetCursor) -> Self {
        Self {
            left: DatedCursor::new(left),
            right: DatedCursor::new(right),
            left_pending: None,
            right_pending: None,
            position: None,
        }
    }

    fn next_offset(&mut self) -> Option<Interval> {
        let reference = match self.position {
            Some(position) => position,
            None => clock::now(),
        };
        if self.left_pending.is_none() {
            self.left_pending = self.left.next_date(reference);
        }
        if self.right_pending.is_none() {
            self.right_pending = self.right.next_date(reference);
        }
        let date = match (self.left_pending, self.right_pending) {
            (None, None) => return None,
            (Some(left), None) => {
                self.left_pending = None;
                left
            }
            (None, Some(right)) => {
                self.right_pending = None;
                right
            }
            (Some(left), Some(right)) if left <= right => {
                self.left_pending = None;
                left
            }
            (_, Some(right)) => {
                self.right_pending = None;
                right
            }
        };
        self.position = Some(date);
        Some(clock::interval_between(reference, date))
    }
}

/// Lifts an offset stream into an absolute-date stream.
struct DatedCursor {
    inner: OffsetCursor,
    position: Option<DateTime<Utc>>,
}

impl DatedCursor {
    fn new(inner: OffsetCursor) -> Self {
        Self {
            inner,
            position: None,
        }
    }

    /// Next absolute date; the stream starts at `anchor` on its first pull.
    fn next_date(&mut self, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let offset = self.inner.next()?;
        let reference = self.position.unwrap_or(anchor);
        let date = clock::add_interval(reference, offset);
        self.position = Some(date);
        Some(date)
    }
}
