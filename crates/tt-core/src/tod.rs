//! Time of day and elapsed time values.
//!
//! A [`Tod`] is a signed fixed-point count of ten-thousandths of a second.
//! The same type carries absolute times of day (decoder passings, wall
//! starts) and durations (elapsed, bunch and limit times). Arithmetic does not
//! wrap at midnight.
//!
//! # Precision
//!
//! Values hold 4 decimal places. Display and ranking truncate (floor) to a
//! requested number of places with [`Tod::truncate`]; arithmetic always runs at
//! full precision.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Local, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TICKS_PER_SECOND: i64 = 10_000;
const SECONDS_PER_DAY: i64 = 86_400;
const HALF_DAY: i64 = 43_200 * TICKS_PER_SECOND;
const HOUR: i64 = 3_600 * TICKS_PER_SECOND;

/// Field widths for right-aligned renderings, indexed by decimal places.
const TIMESTR_WIDTH: [usize; 5] = [8, 10, 11, 12, 13];
/// Trailing pad so that differing precisions line up on the decimal point.
const TIMESTR_PAD: [&str; 5] = ["     ", "   ", "  ", " ", ""];

/// Canonical, Omega, Chronelec and keypad time formats.
static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(-?)(?:(?:(\d+)[h:-])?(\d{1,2})[:'-])?(\d{1,2}(?:[."]\d+)?)$"#)
        .expect("time pattern is valid")
});

/// Errors from parsing a time string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TodParseError {
    /// The input was empty or whitespace.
    #[error("empty time value")]
    Empty,

    /// The input did not match any accepted time format.
    #[error("invalid time value: {0:?}")]
    Invalid(String),
}

/// A time of day or elapsed duration with 4 decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tod(i64);

impl Tod {
    /// Zero time. Sorts before every positive value.
    pub const ZERO: Self = Self(0);

    /// One second.
    pub const ONE: Self = Self(TICKS_PER_SECOND);

    /// One minute.
    pub const MINUTE: Self = Self(60 * TICKS_PER_SECOND);

    /// The largest time of day, `23h59:59.9999`.
    ///
    /// Used as the "not yet seen" sentinel: it sorts after every real passing.
    pub const MAX: Self = Self(SECONDS_PER_DAY * TICKS_PER_SECOND - 1);

    /// Creates a value from whole seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * TICKS_PER_SECOND)
    }

    /// Creates a value from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis * 10)
    }

    /// Creates a value from raw ten-thousandths of a second.
    #[must_use]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Creates a value from fractional seconds, rounded to 4 places.
    ///
    /// Returns `None` for non-finite input.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "rounded seconds are well inside i64 range for any race"
    )]
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if secs.is_finite() {
            Some(Self((secs * 10_000.0).round() as i64))
        } else {
            None
        }
    }

    /// The current local time of day.
    pub fn now() -> Self {
        let now = Local::now();
        let secs = i64::from(now.num_seconds_from_midnight());
        let frac = i64::from(now.nanosecond() % 1_000_000_000) / 100_000;
        Self(secs * TICKS_PER_SECOND + frac)
    }

    /// Raw ten-thousandths of a second.
    #[must_use]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Value in seconds as a float, for speed and distance estimates.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "race times are far below 2^52 ticks"
    )]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 10_000.0
    }

    /// Whole seconds, truncated toward negative infinity.
    #[must_use]
    pub const fn whole_seconds(self) -> i64 {
        self.0.div_euclid(TICKS_PER_SECOND)
    }

    /// Absolute value.
    #[must_use]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Truncates (floors) to the given number of decimal places (0-4).
    #[must_use]
    pub const fn truncate(self, places: u8) -> Self {
        let quantum = quantum(places);
        Self(self.0.div_euclid(quantum) * quantum)
    }

    /// Time string without padding, e.g. `1:02.3` or `1h02:03.45`.
    #[must_use]
    pub fn rawtime(self, places: u8) -> String {
        self.format(places, "h", ":")
    }

    /// Time string right-aligned for columns with differing precisions.
    #[must_use]
    pub fn timestr(self, places: u8) -> String {
        let places = places.min(4);
        let idx = usize::from(places);
        format!(
            "{:>width$}{}",
            self.rawtime(places),
            TIMESTR_PAD[idx],
            width = TIMESTR_WIDTH[idx]
        )
    }

    /// Twelve-hour clock rendering of a time of day, e.g. `1:05:00 pm`.
    #[must_use]
    pub fn meridiem(self) -> String {
        let day = SECONDS_PER_DAY * TICKS_PER_SECOND;
        let mut tv = self.0.rem_euclid(day);
        let suffix = if tv >= HALF_DAY { "\u{2006}pm" } else { "\u{2006}am" };
        tv %= HALF_DAY;
        if tv < HOUR {
            tv += HALF_DAY;
        }
        format!("{}{suffix}", Self(tv).format(0, ":", ":"))
    }

    /// Average speed over `dist_m` metres, e.g. ` 45.2 km/h`.
    #[must_use]
    pub fn speed_str(self, dist_m: f64) -> String {
        if self.0 == 0 {
            return "---.- km/h".to_string();
        }
        format!("{:5.1} km/h", 3.6 * dist_m / self.as_seconds())
    }

    fn format(self, places: u8, hoursep: &str, minsep: &str) -> String {
        let places = places.min(4);
        let value = self.truncate(places).0;
        let sign = if value < 0 { "-" } else { "" };
        let value = value.abs();
        let secs = value / TICKS_PER_SECOND;
        let frac = (value % TICKS_PER_SECOND) / quantum(places);
        let fraction = if places == 0 {
            String::new()
        } else {
            format!(".{frac:0width$}", width = usize::from(places))
        };
        if secs >= 3600 {
            format!(
                "{sign}{}{hoursep}{:02}{minsep}{:02}{fraction}",
                secs / 3600,
                (secs % 3600) / 60,
                secs % 60
            )
        } else if secs >= 60 {
            format!("{sign}{}{minsep}{:02}{fraction}", secs / 60, secs % 60)
        } else {
            format!("{sign}{secs}{fraction}")
        }
    }
}

const fn quantum(places: u8) -> i64 {
    match places {
        0 => 10_000,
        1 => 1_000,
        2 => 100,
        3 => 10,
        _ => 1,
    }
}

/// Parses a decimal seconds string into ticks, truncating past 4 places.
fn parse_decimal_seconds(s: &str) -> Option<i64> {
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut ticks = whole.checked_mul(TICKS_PER_SECOND)?;
    let mut scale = 1_000;
    for digit in frac.bytes().take(4) {
        ticks = ticks.checked_add(i64::from(digit - b'0') * scale)?;
        scale /= 10;
    }
    Some(ticks)
}

impl FromStr for Tod {
    type Err = TodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TodParseError::Empty);
        }
        let invalid = || TodParseError::Invalid(s.to_string());

        if let Some(caps) = TIME_PATTERN.captures(s) {
            let seconds = caps.get(4).map_or("", |m| m.as_str()).replace('"', ".");
            let mut ticks = parse_decimal_seconds(&seconds).ok_or_else(invalid)?;
            let minutes: i64 = caps
                .get(3)
                .map_or(Ok(0), |m| m.as_str().parse())
                .map_err(|_| invalid())?;
            let hours: i64 = caps
                .get(2)
                .map_or(Ok(0), |m| m.as_str().parse())
                .map_err(|_| invalid())?;
            ticks = hours
                .checked_mul(3600)
                .and_then(|secs| secs.checked_add(minutes.checked_mul(60)?))
                .and_then(|secs| secs.checked_mul(TICKS_PER_SECOND))
                .and_then(|whole| whole.checked_add(ticks))
                .ok_or_else(invalid)?;
            if caps.get(1).is_some_and(|m| !m.as_str().is_empty()) {
                ticks = -ticks;
            }
            return Ok(Self(ticks));
        }

        // Plain decimal seconds, e.g. "120" or "-3.5"
        let (negative, digits) = s.strip_prefix('-').map_or((false, s), |rest| (true, rest));
        let ticks = parse_decimal_seconds(digits).ok_or_else(invalid)?;
        Ok(Self(if negative { -ticks } else { ticks }))
    }
}

impl TryFrom<String> for Tod {
    type Error = TodParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Tod> for String {
    fn from(value: Tod) -> Self {
        value.rawtime(4)
    }
}

impl fmt::Display for Tod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rawtime(4))
    }
}

impl Add for Tod {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Tod {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Tod {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Tod {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}
