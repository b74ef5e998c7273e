//! Projects schedule codes onto the posted-week calendar.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::sync::Arc;

use crate::calendar::SweepCalendar;
use crate::schedule::{parse_weekday, WeekSet};

/// How far ahead a projection scans, in days (today inclusive).
pub const SCAN_HORIZON_DAYS: i64 = 120;

/// Answers "is it today" and "when is it next" for a posted weekday and the
/// week set of its schedule code. Holds no mutable state, so a projector can
/// be shared freely.
#[derive(Debug, Clone)]
pub struct SweepProjector {
    calendar: Arc<SweepCalendar>,
}

impl SweepProjector {
    pub fn new(calendar: Arc<SweepCalendar>) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &SweepCalendar {
        &self.calendar
    }

    /// Whether `today` is an enforced sweep day for this weekday and schedule.
    pub fn is_sweep_day(&self, weekday: &str, weeks: WeekSet, today: NaiveDate) -> bool {
        if self.calendar.is_holiday(today) {
            return false;
        }
        if parse_weekday(weekday) != Some(today.weekday()) {
            return false;
        }
        match self.calendar.week_of(today) {
            Some(week) => weeks.contains(week),
            None => false,
        }
    }

    /// True when any of `weekdays` sweeps today.
    pub fn is_sweep_day_any<S: AsRef<str>>(
        &self,
        weekdays: &[S],
        weeks: WeekSet,
        today: NaiveDate,
    ) -> bool {
        weekdays
            .iter()
            .any(|day| self.is_sweep_day(day.as_ref(), weeks, today))
    }

    /// Lazily scan sweep dates from `from` (inclusive) to the horizon.
    pub fn occurrences(&self, weekday: &str, weeks: WeekSet, from: NaiveDate) -> Occurrences<'_> {
        Occurrences {
            calendar: &self.calendar,
            weekday: parse_weekday(weekday),
            weeks,
            cursor: from,
            end: from + Duration::days(SCAN_HORIZON_DAYS),
        }
    }

    /// The next `count` sweep dates, ascending. Fewer are returned when the
    /// horizon (or the end of the loaded calendar) is reached first.
    pub fn next_occurrences(
        &self,
        weekday: &str,
        weeks: WeekSet,
        today: NaiveDate,
        count: usize,
    ) -> Vec<NaiveDate> {
        self.occurrences(weekday, weeks, today).take(count).collect()
    }

    /// Up to `per_day` dates for each weekday, merged and sorted ascending.
    pub fn next_across<S: AsRef<str>>(
        &self,
        weekdays: &[S],
        weeks: WeekSet,
        today: NaiveDate,
        per_day: usize,
    ) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = weekdays
            .iter()
            .flat_map(|day| self.next_occurrences(day.as_ref(), weeks, today, per_day))
            .collect();
        dates.sort();
        dates
    }
}

/// Iterator over sweep dates produced by [`SweepProjector::occurrences`].
/// Finite: it stops at the scan horizon.
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    calendar: &'a SweepCalendar,
    weekday: Option<Weekday>,
    weeks: WeekSet,
    cursor: NaiveDate,
    end: NaiveDate,
}

impl Iterator for Occurrences<'_> {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let weekday = self.weekday?;
        while self.cursor < self.end {
            let date = self.cursor;
            self.cursor = date.succ_opt()?;
            if date.weekday() != weekday || self.calendar.is_holiday(date) {
                continue;
            }
            if let Some(week) = self.calendar.week_of(date) {
                if self.weeks.contains(week) {
                    return Some(date);
                }
            }
        }
        None
    }
}
