// src/time_interval.rs
//
// Clock-time arithmetic over "HH:MM" values. An interval whose end is not after its
// start crosses midnight: its end is read as `end + MINUTES_PER_DAY`.

use chrono::{NaiveTime, Timelike};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Decimal places kept for derived hour values (minute conversions, per-person splits).
pub const HOURS_DP: u32 = 6;

// --- Clock Time ---

/// Minutes since midnight, always within `0..MINUTES_PER_DAY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn from_hm(hours: u32, minutes: u32) -> Option<Self> {
        if hours < 24 && minutes < 60 {
            Some(ClockTime((hours * 60 + minutes) as u16))
        } else {
            None
        }
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(ClockTime(minutes as u16))
    }

    pub fn minutes(self) -> u32 {
        u32::from(self.0)
    }

    pub fn hour(self) -> u32 {
        self.minutes() / 60
    }

    pub fn minute(self) -> u32 {
        self.minutes() % 60
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        to_minutes(s).map(|m| ClockTime(m as u16))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

// --- Primitive Operations ---

/// Parses `"HH:MM"` into minutes since midnight.
pub fn to_minutes(s: &str) -> Result<u32, ValidationError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map(|t| t.hour() * 60 + t.minute())
        .map_err(|_| ValidationError::InvalidTimeFormat {
            value: s.to_string(),
        })
}

/// `end` when it lies after `start`, otherwise `end` on the following day.
pub fn wrapped_end(start: u32, end: u32) -> u32 {
    if end > start {
        end
    } else {
        end + MINUTES_PER_DAY
    }
}

/// Length in minutes, in `0..MINUTES_PER_DAY`. Equal bounds give zero.
pub fn duration(start: u32, end: u32) -> u32 {
    (wrapped_end(start, end) - start) % MINUTES_PER_DAY
}

/// Inclusive point membership with overnight wrap.
pub fn contains_point(interval: &Interval, point: ClockTime) -> bool {
    interval.contains_point(point)
}

/// Hours rounded to `HOURS_DP` places; sums of rounded values stay exact.
pub fn minutes_to_hours(minutes: u32) -> Decimal {
    (Decimal::from(minutes) / dec!(60)).round_dp(HOURS_DP)
}

// --- Interval ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl Interval {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(start.parse()?, end.parse()?))
    }

    /// Builds an interval only when both bounds are set.
    pub fn from_bounds(start: Option<ClockTime>, end: Option<ClockTime>) -> Option<Self> {
        Some(Self::new(start?, end?))
    }

    pub fn is_overnight(&self) -> bool {
        self.end <= self.start
    }

    pub fn wrapped_end(&self) -> u32 {
        wrapped_end(self.start.minutes(), self.end.minutes())
    }

    pub fn duration_minutes(&self) -> u32 {
        duration(self.start.minutes(), self.end.minutes())
    }

    pub fn is_empty(&self) -> bool {
        self.duration_minutes() == 0
    }

    pub fn hours(&self) -> Decimal {
        minutes_to_hours(self.duration_minutes())
    }

    /// Places `point` on this interval's timeline, treating `start` as day zero.
    pub fn normalize(&self, point: ClockTime) -> u32 {
        if point < self.start {
            point.minutes() + MINUTES_PER_DAY
        } else {
            point.minutes()
        }
    }

    pub fn contains_point(&self, point: ClockTime) -> bool {
        let p = self.normalize(point);
        p >= self.start.minutes() && p <= self.wrapped_end()
    }

    /// Key used to bucket assignments that share the same time range, `"HH:MM-HH:MM"`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
