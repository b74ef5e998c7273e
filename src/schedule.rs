//! Schedule codes ("1 & 3", "2nd & 4th") and posted weekday names.

use chrono::Weekday;
use std::fmt;

/// A set of posted week numbers (1-4) stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekSet(u8);

impl WeekSet {
    pub const ALL: WeekSet = WeekSet(0b1111);
    pub const FIRST_AND_THIRD: WeekSet = WeekSet(0b0101);
    pub const SECOND_AND_FOURTH: WeekSet = WeekSet(0b1010);

    pub fn contains(&self, week: u8) -> bool {
        (1..=4).contains(&week) && self.0 & (1 << (week - 1)) != 0
    }

    /// Week numbers in ascending order.
    pub fn weeks(&self) -> Vec<u8> {
        (1..=4).filter(|w| self.contains(*w)).collect()
    }
}

impl fmt::Display for WeekSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let weeks: Vec<String> = self.weeks().iter().map(|w| w.to_string()).collect();
        write!(f, "{{{}}}", weeks.join(","))
    }
}

/// Interpret a schedule code. Codes mentioning both 1 and 3 are "1st & 3rd",
/// codes mentioning both 2 and 4 are "2nd & 4th"; anything else (including
/// malformed codes) means every posted week.
pub fn normalize(code: &str) -> WeekSet {
    if code.contains('1') && code.contains('3') {
        WeekSet::FIRST_AND_THIRD
    } else if code.contains('2') && code.contains('4') {
        WeekSet::SECOND_AND_FOURTH
    } else {
        WeekSet::ALL
    }
}

/// A schedule code as published, interpreted once into its week set.
///
/// Equality compares the normalized weeks, so "1 & 3" equals "1st & 3rd".
/// The raw text is kept for display and storage.
#[derive(Debug, Clone)]
pub struct ScheduleCode {
    raw: String,
    weeks: WeekSet,
}

impl ScheduleCode {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let weeks = normalize(&raw);
        Self { raw, weeks }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn weeks(&self) -> WeekSet {
        self.weeks
    }

    /// True when nothing was posted. A blank code still projects onto every
    /// week, but lookup cards treat it as an unknown schedule.
    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

impl Default for ScheduleCode {
    fn default() -> Self {
        Self::new("")
    }
}

impl From<&str> for ScheduleCode {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ScheduleCode {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl PartialEq for ScheduleCode {
    fn eq(&self, other: &Self) -> bool {
        self.weeks == other.weeks
    }
}

impl Eq for ScheduleCode {}

impl fmt::Display for ScheduleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a posted weekday name. Sweeping is only posted Monday-Friday, so
/// weekend and unknown names yield `None`.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        _ => None,
    }
}
