//! ISO 8601 week identifiers (`2026-W42`)

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;

use crate::model::Goal;

/// A calendar week in the ISO week-numbering year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoWeekId {
    pub year: i32,
    pub week: u32,
}

fn week_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{4})-W(\d{2})$").ok())
        .as_ref()
}

/// Longest schedule a new goal may have, about ten years
pub const MAX_DURATION_WEEKS: u32 = 520;

impl IsoWeekId {
    /// Validate a (year, week) pair against the year's week count
    pub fn new(year: i32, week: u32) -> Option<Self> {
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).map(|_| Self { year, week })
    }

    /// The week containing `date`
    pub fn of(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// The week containing today (local time)
    pub fn current() -> Self {
        Self::of(chrono::Local::now().date_naive())
    }

    /// Monday of this week
    pub fn monday(&self) -> NaiveDate {
        // Constructed through `new` or `of`, so always valid
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon).unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Self {
        Self::of(self.monday() + Duration::weeks(1))
    }

    /// Whole weeks from this week to `later`, negative when `later` is earlier
    pub fn weeks_until(&self, later: IsoWeekId) -> i64 {
        (later.monday() - self.monday()).num_weeks()
    }
}

impl fmt::Display for IsoWeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-W{:02}", self.year, self.week)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWeekError(pub String);

impl fmt::Display for ParseWeekError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ISO week '{}'", self.0)
    }
}

impl std::error::Error for ParseWeekError {}

impl FromStr for IsoWeekId {
    type Err = ParseWeekError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = week_pattern()
            .and_then(|re| re.captures(s.trim()))
            .ok_or_else(|| ParseWeekError(s.to_string()))?;
        let year: i32 = caps[1].parse().map_err(|_| ParseWeekError(s.to_string()))?;
        let week: u32 = caps[2].parse().map_err(|_| ParseWeekError(s.to_string()))?;
        Self::new(year, week).ok_or_else(|| ParseWeekError(s.to_string()))
    }
}

/// Whether a goal's scheduled span covers `week`.
/// Unscheduled goals cover nothing; a missing duration means one week.
pub fn covers(goal: &Goal, week: IsoWeekId) -> bool {
    let Some(start) = goal.iso_week() else {
        return false;
    };
    let weeks = goal.duration.unwrap_or(1).max(1);
    let offset = start.weeks_until(week);
    offset >= 0 && offset < i64::from(weeks)
}
