//! Minute-resolution slice dates and their directory form.

use super::error::StoreError;
use chrono::{Datelike, Local, NaiveDate, TimeDelta, Timelike};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Key of one time-slice: `year/month/day/hour/minute`.
///
/// The path form leaves month and day unpadded and zero-pads hour and minute
/// (`2025/3/7/09/05`). Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SliceDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl SliceDate {
    /// Builds a date, rejecting impossible calendar values.
    pub fn new(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
        Some(Self {
            year,
            month,
            day,
            hour,
            minute,
        })
    }

    /// Current local time truncated to the minute.
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn from_datetime<T: Datelike + Timelike>(dt: &T) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
        }
    }

    /// Parses the path form. Components may be padded or unpadded.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let parts: Vec<&str> = s
            .trim()
            .trim_matches('/')
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() != 5 {
            return Err(StoreError::InvalidDate(s.to_string()));
        }
        Self::from_parts(s, &parts)
    }

    /// Parses user input such as `2025-3-7 9:05` or `2025/3/7`.
    ///
    /// Year, month and day are required; hour and minute default to zero.
    pub fn parse_loose(s: &str) -> Result<Self, StoreError> {
        let parts: Vec<&str> = s
            .split(|c: char| c == '-' || c == ':' || c == '/' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if !(3..=5).contains(&parts.len()) {
            return Err(StoreError::InvalidDate(s.to_string()));
        }
        let mut padded = parts.clone();
        padded.resize(5, "0");
        Self::from_parts(s, &padded)
    }

    fn from_parts(input: &str, parts: &[&str]) -> Result<Self, StoreError> {
        let invalid = || StoreError::InvalidDate(input.to_string());
        let year = parts[0].parse::<i32>().map_err(|_| invalid())?;
        let mut rest = [0u32; 4];
        for (slot, part) in rest.iter_mut().zip(&parts[1..]) {
            *slot = part.parse::<u32>().map_err(|_| invalid())?;
        }
        Self::new(year, rest[0], rest[1], rest[2], rest[3]).ok_or_else(invalid)
    }

    /// The following minute, rolling over hours, days and years.
    pub fn next_minute(&self) -> Self {
        match NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|d| d.and_hms_opt(self.hour, self.minute, 0))
        {
            Some(dt) => Self::from_datetime(&(dt + TimeDelta::minutes(1))),
            None => *self,
        }
    }

    /// Directory components, root-relative.
    pub fn components(&self) -> [String; 5] {
        [
            self.year.to_string(),
            self.month.to_string(),
            self.day.to_string(),
            format!("{:02}", self.hour),
            format!("{:02}", self.minute),
        ]
    }

    /// Relative directory of the slice below a snapshot root.
    pub fn to_path(&self) -> PathBuf {
        self.components().iter().collect()
    }

    /// Human form shown by listing commands: `3/7/2025-09:05`.
    pub fn formatted(&self) -> String {
        format!(
            "{}/{}/{}-{:02}:{:02}",
            self.month, self.day, self.year, self.hour, self.minute
        )
    }
}

impl fmt::Display for SliceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{:02}/{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

impl FromStr for SliceDate {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
