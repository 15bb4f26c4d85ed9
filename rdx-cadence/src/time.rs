//! A clock-face time of day, parseable from short human strings.
//!
//! `Time` pins a calendar-anchored schedule to a moment within its day:
//! `every_weekday(Weekday::Fri).at_time(time)` fires Fridays at that time
//! instead of at midnight. Parsing accepts the compact forms people
//! actually type (`"11"`, `"11:12"`, `"11:12:13.123"`, with an optional
//! `" am"` / `" pm"` suffix) and rejects everything else.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interval::Interval;

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// A validated time of day. Construction never produces out-of-range
/// fields; parsing failures surface as `None`, not as panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time {
    hour: u32,
    minute: u32,
    second: u32,
    nanosecond: u32,
}

impl Time {
    /// Builds a time of day, returning `None` when any field is out of
    /// range (hour ≥ 24, minute/second ≥ 60, nanosecond ≥ 10⁹).
    pub fn new(hour: u32, minute: u32, second: u32, nanosecond: u32) -> Option<Self> {
        if hour >= 24 || minute >= 60 || second >= 60 || nanosecond >= NANOS_PER_SECOND {
            return None;
        }
        Some(Self {
            hour,
            minute,
            second,
            nanosecond,
        })
    }

    /// Parses a clock-face string.
    ///
    /// Accepted shapes: `"11"`, `"11:12"`, `"11:12:13"`, `"11:12:13.123"`,
    /// each optionally suffixed with `" am"`, `" AM"`, `" pm"` or `" PM"`.
    /// `12 am` maps to hour 0, `12 pm` stays 12, and other pm hours gain
    /// 12. Anything else returns `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let (body, meridiem) = split_meridiem(text);

        let mut parts = body.split(':');
        let hour_part = parts.next()?;
        let minute_part = parts.next();
        let second_part = parts.next();
        if parts.next().is_some() {
            return None;
        }

        let mut hour = parse_component(hour_part)?;
        let minute = match minute_part {
            Some(part) => parse_component(part)?,
            None => 0,
        };
        let (second, nanosecond) = match second_part {
            Some(part) => parse_seconds(part)?,
            None => (0, 0),
        };

        match meridiem {
            Some(Meridiem::Am) if hour == 12 => hour = 0,
            Some(Meridiem::Pm) if hour != 12 => hour += 12,
            _ => {}
        }

        Self::new(hour, minute, second, nanosecond)
    }

    pub const fn hour(self) -> u32 {
        self.hour
    }

    pub const fn minute(self) -> u32 {
        self.minute
    }

    pub const fn second(self) -> u32 {
        self.second
    }

    pub const fn nanosecond(self) -> u32 {
        self.nanosecond
    }

    /// The offset of this time from the midnight that starts its day.
    pub fn interval_since_midnight(self) -> Interval {
        Interval::hours(self.hour as i64)
            + Interval::minutes(self.minute as i64)
            + Interval::seconds(self.second as i64)
            + Interval::nanoseconds(self.nanosecond as i64)
    }
}

#[derive(Clone, Copy)]
enum Meridiem {
    Am,
    Pm,
}

fn split_meridiem(text: &str) -> (&str, Option<Meridiem>) {
    for (suffix, meridiem) in [
        (" am", Meridiem::Am),
        (" AM", Meridiem::Am),
        (" pm", Meridiem::Pm),
        (" PM", Meridiem::Pm),
    ] {
        if let Some(body) = text.strip_suffix(suffix) {
            return (body, Some(meridiem));
        }
    }
    (text, None)
}

/// A one-or-two digit field. Signs, spaces and longer runs are rejected.
fn parse_component(part: &str) -> Option<u32> {
    if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// The seconds field with an optional `.123` fraction (1 to 3 digits,
/// scaled to nanoseconds).
fn parse_seconds(part: &str) -> Option<(u32, u32)> {
    match part.split_once('.') {
        None => Some((parse_component(part)?, 0)),
        Some((whole, fraction)) => {
            if fraction.is_empty()
                || fraction.len() > 3
                || !fraction.chars().all(|c| c.is_ascii_digit())
            {
                return None;
            }
            let scale = 10u32.pow(9 - fraction.len() as u32);
            let nanos = fraction.parse::<u32>().ok()? * scale;
            Some((parse_component(whole)?, nanos))
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)?;
        if self.nanosecond != 0 {
            write!(f, ".{:03}", self.nanosecond / 1_000_000)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_hours() {
        let time = Time::parse("11").unwrap();
        assert_eq!((time.hour(), time.minute(), time.second()), (11, 0, 0));
        assert_eq!(time.nanosecond(), 0);
    }

    #[test]
    fn parses_hours_and_minutes() {
        let time = Time::parse("11:12").unwrap();
        assert_eq!((time.hour(), time.minute(), time.second()), (11, 12, 0));
    }

    #[test]
    fn parses_fractional_seconds_as_milliseconds() {
        let time = Time::parse("11:12:13.123").unwrap();
        assert_eq!(
            (time.hour(), time.minute(), time.second(), time.nanosecond()),
            (11, 12, 13, 123_000_000)
        );
        assert_eq!(Time::parse("0:0:0.5").unwrap().nanosecond(), 500_000_000);
    }

    #[test]
    fn evening_suffix_shifts_the_hour() {
        let time = Time::parse("11 pm").unwrap();
        assert_eq!((time.hour(), time.minute(), time.second()), (23, 0, 0));
        assert_eq!(Time::parse("9:30 PM").unwrap().hour(), 21);
    }

    #[test]
    fn noon_and_midnight_follow_the_twelve_hour_convention() {
        assert_eq!(Time::parse("12 am").unwrap().hour(), 0);
        assert_eq!(Time::parse("12 pm").unwrap().hour(), 12);
        assert_eq!(Time::parse("12 AM").unwrap().hour(), 0);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(Time::parse("25").is_none());
        assert!(Time::parse("11:60").is_none());
        assert!(Time::parse("11:12:61").is_none());
        assert!(Time::parse("13 pm").is_none());
        assert!(Time::new(24, 0, 0, 0).is_none());
        assert!(Time::new(0, 0, 0, NANOS_PER_SECOND).is_none());
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(Time::parse("").is_none());
        assert!(Time::parse("eleven").is_none());
        assert!(Time::parse("11:12:13:14").is_none());
        assert!(Time::parse("11:12:13.1234").is_none());
        assert!(Time::parse("11:").is_none());
        assert!(Time::parse("+5").is_none());
        assert!(Time::parse("11 aM").is_none());
        assert!(Time::parse("007").is_none());
    }

    #[test]
    fn interval_since_midnight_accumulates_all_fields() {
        let time = Time::new(2, 30, 15, 500_000_000).unwrap();
        let expected = Interval::hours(2)
            + Interval::minutes(30)
            + Interval::seconds(15)
            + Interval::milliseconds(500);
        assert_eq!(time.interval_since_midnight(), expected);
    }

    #[test]
    fn display_is_clock_faced() {
        assert_eq!(Time::parse("9:05").unwrap().to_string(), "09:05:00");
        assert_eq!(
            Time::parse("11:12:13.123").unwrap().to_string(),
            "11:12:13.123"
        );
    }
}
