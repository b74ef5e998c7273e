//! Posted sweep-week calendar and enforcement holidays.
//!
//! The jurisdiction publishes a calendar once per year: four posted weeks per
//! month, each identified by the Monday that starts it. Only the Monday to
//! Friday following an anchor is enforced; partial weeks at month edges are
//! unposted and therefore absent from the lookup.

mod la2026;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

/// Days enforced per posted week (Monday through Friday).
const DAYS_PER_WEEK: i64 = 5;

/// Errors in authored calendar data. These are configuration errors and are
/// only ever raised while the calendar is being built at startup.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("invalid date in calendar data: {0}-{1:02}-{2:02}")]
    InvalidDate(i32, u32, u32),

    #[error("anchor {0} falls on a {1}, expected a Monday")]
    NotMonday(NaiveDate, Weekday),

    #[error("anchor {0} has week number {1}, expected 1-4")]
    WeekOutOfRange(NaiveDate, u8),

    #[error("anchor {date} belongs to {actual}, not calendar year {year}")]
    AnchorOutsideYear { date: NaiveDate, year: i32, actual: i32 },

    #[error("{year}-{month:02} has {found} anchors, expected 4")]
    AnchorCount { year: i32, month: u32, found: usize },

    #[error("{year}-{month:02} anchors are numbered {found:?}, expected [1, 2, 3, 4]")]
    WeekOrder { year: i32, month: u32, found: Vec<u8> },

    #[error("{0} is covered by more than one anchor")]
    Overlap(NaiveDate),

    #[error("holiday {date} is outside calendar year {year}")]
    HolidayOutsideYear { date: NaiveDate, year: i32 },

    #[error("calendar year {0} is defined more than once")]
    DuplicateYear(i32),

    #[error("failed to read calendar file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse calendar file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// An anchor Monday and the posted week number it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub monday: NaiveDate,
    pub week: u8,
}

/// One year of authored calendar data, as published.
///
/// Calendar files use the same shape:
///
/// ```toml
/// year = 2027
/// holidays = ["2027-01-01", "2027-01-18"]
///
/// [[anchors]]
/// monday = "2027-01-04"
/// week = 1
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarYear {
    pub year: i32,
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    pub anchors: Vec<Anchor>,
}

impl CalendarYear {
    /// The built-in 2026 Los Angeles calendar.
    pub fn la_2026() -> Result<Self, CalendarError> {
        let anchors = la2026::ANCHORS
            .iter()
            .map(|&(y, m, d, week)| -> Result<Anchor, CalendarError> {
                Ok(Anchor { monday: ymd(y, m, d)?, week })
            })
            .collect::<Result<Vec<_>, CalendarError>>()?;
        let holidays = la2026::HOLIDAYS
            .iter()
            .map(|&(y, m, d)| ymd(y, m, d))
            .collect::<Result<Vec<_>, CalendarError>>()?;
        Ok(Self {
            year: la2026::YEAR,
            anchors,
            holidays,
        })
    }

    /// Load a calendar year from a TOML file.
    pub fn load(path: &Path) -> Result<Self, CalendarError> {
        let content = std::fs::read_to_string(path).map_err(|source| CalendarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| CalendarError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the authored anchor table: Mondays only, weeks 1-4 in order,
    /// four per month, every month present.
    fn validate(&self) -> Result<(), CalendarError> {
        let mut by_month: BTreeMap<u32, Vec<Anchor>> = BTreeMap::new();
        for anchor in &self.anchors {
            let weekday = anchor.monday.weekday();
            if weekday != Weekday::Mon {
                return Err(CalendarError::NotMonday(anchor.monday, weekday));
            }
            if !(1..=4).contains(&anchor.week) {
                return Err(CalendarError::WeekOutOfRange(anchor.monday, anchor.week));
            }
            if anchor.monday.year() != self.year {
                return Err(CalendarError::AnchorOutsideYear {
                    date: anchor.monday,
                    year: self.year,
                    actual: anchor.monday.year(),
                });
            }
            by_month.entry(anchor.monday.month()).or_default().push(*anchor);
        }

        for month in 1..=12 {
            let mut anchors = by_month.remove(&month).unwrap_or_default();
            if anchors.len() != 4 {
                return Err(CalendarError::AnchorCount {
                    year: self.year,
                    month,
                    found: anchors.len(),
                });
            }
            anchors.sort_by_key(|a| a.monday);
            let weeks: Vec<u8> = anchors.iter().map(|a| a.week).collect();
            if weeks != [1, 2, 3, 4] {
                return Err(CalendarError::WeekOrder {
                    year: self.year,
                    month,
                    found: weeks,
                });
            }
        }

        if let Some(date) = self.holidays.iter().find(|d| d.year() != self.year) {
            return Err(CalendarError::HolidayOutsideYear {
                date: *date,
                year: self.year,
            });
        }

        Ok(())
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, CalendarError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(CalendarError::InvalidDate(year, month, day))
}

/// Date to posted-week lookup. Absent dates are unposted (no enforcement).
#[derive(Debug, Clone, Default)]
pub struct PostedWeekCalendar {
    weeks: BTreeMap<NaiveDate, u8>,
}

impl PostedWeekCalendar {
    /// Expand every anchor into its Monday-Friday span.
    pub fn build<'a>(
        years: impl IntoIterator<Item = &'a CalendarYear>,
    ) -> Result<Self, CalendarError> {
        let mut weeks = BTreeMap::new();
        for year in years {
            year.validate()?;
            for anchor in &year.anchors {
                for offset in 0..DAYS_PER_WEEK {
                    let date = anchor.monday + Duration::days(offset);
                    if weeks.insert(date, anchor.week).is_some() {
                        return Err(CalendarError::Overlap(date));
                    }
                }
            }
        }
        Ok(Self { weeks })
    }

    /// Posted week number for `date`, or `None` when the date is unposted.
    pub fn week_of(&self, date: NaiveDate) -> Option<u8> {
        self.weeks.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.weeks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    /// All posted dates in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u8)> + '_ {
        self.weeks.iter().map(|(d, w)| (*d, *w))
    }
}

/// Dates exempt from enforcement.
#[derive(Debug, Clone, Default)]
pub struct HolidaySet {
    dates: HashSet<NaiveDate>,
}

impl HolidaySet {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Posted weeks and holidays for every loaded year. Immutable once built;
/// share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SweepCalendar {
    weeks: PostedWeekCalendar,
    holidays: HolidaySet,
    years: BTreeSet<i32>,
}

impl SweepCalendar {
    pub fn from_years(years: &[CalendarYear]) -> Result<Self, CalendarError> {
        let mut seen = BTreeSet::new();
        for year in years {
            if !seen.insert(year.year) {
                return Err(CalendarError::DuplicateYear(year.year));
            }
        }
        let weeks = PostedWeekCalendar::build(years)?;
        let holidays = HolidaySet::new(years.iter().flat_map(|y| y.holidays.iter().copied()));
        Ok(Self {
            weeks,
            holidays,
            years: seen,
        })
    }

    /// Built-in calendars only.
    pub fn builtin() -> Result<Self, CalendarError> {
        Self::from_years(&[CalendarYear::la_2026()?])
    }

    /// Built-in calendars plus calendar files. A file for a year that is
    /// already built in replaces the built-in table.
    pub fn load(extra_files: &[PathBuf]) -> Result<Self, CalendarError> {
        let mut years: BTreeMap<i32, CalendarYear> = BTreeMap::new();
        let builtin = CalendarYear::la_2026()?;
        years.insert(builtin.year, builtin);

        let mut from_files = BTreeSet::new();
        for path in extra_files {
            let year = CalendarYear::load(path)?;
            if !from_files.insert(year.year) {
                return Err(CalendarError::DuplicateYear(year.year));
            }
            info!(year = year.year, path = ?path, "Loaded calendar file");
            years.insert(year.year, year);
        }

        let years: Vec<CalendarYear> = years.into_values().collect();
        Self::from_years(&years)
    }

    pub fn week_of(&self, date: NaiveDate) -> Option<u8> {
        self.weeks.week_of(date)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(date)
    }

    pub fn posted_weeks(&self) -> &PostedWeekCalendar {
        &self.weeks
    }

    pub fn holidays(&self) -> &HolidaySet {
        &self.holidays
    }

    /// Calendar years covered.
    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calendar() -> SweepCalendar {
        SweepCalendar::builtin().unwrap()
    }

    #[test]
    fn test_builtin_calendar_builds() {
        let cal = calendar();
        assert_eq!(cal.posted_weeks().len(), 48 * 5);
        assert_eq!(cal.holidays().len(), 11);
        assert_eq!(cal.years().collect::<Vec<_>>(), vec![2026]);
    }

    #[test]
    fn test_partial_week_at_month_start_is_unposted() {
        let cal = calendar();
        // July 2026 starts on a Wednesday
        assert_eq!(cal.week_of(date(2026, 7, 1)), None);
        assert_eq!(cal.week_of(date(2026, 7, 2)), None);
        assert_eq!(cal.week_of(date(2026, 7, 6)), Some(1));
        assert_eq!(cal.week_of(date(2026, 7, 10)), Some(1));
    }

    #[test]
    fn test_partial_week_at_month_end_is_unposted() {
        let cal = calendar();
        assert_eq!(cal.week_of(date(2026, 3, 27)), Some(4));
        assert_eq!(cal.week_of(date(2026, 3, 30)), None);
        assert_eq!(cal.week_of(date(2026, 3, 31)), None);
    }

    #[test]
    fn test_week_spilling_into_next_month_keeps_its_number() {
        let cal = calendar();
        // April's fourth week runs Apr 27 - May 1
        assert_eq!(cal.week_of(date(2026, 5, 1)), Some(4));
        assert_eq!(cal.week_of(date(2026, 5, 4)), Some(1));
    }

    #[test]
    fn test_weekends_absent() {
        let cal = calendar();
        assert_eq!(cal.week_of(date(2026, 3, 7)), None);
        assert_eq!(cal.week_of(date(2026, 3, 8)), None);
    }

    #[test]
    fn test_every_month_has_twenty_posted_days() {
        let cal = calendar();
        let mut per_month: HashMap<u32, usize> = HashMap::new();
        for (d, _) in cal.posted_weeks().iter() {
            let monday = d - Duration::days(d.weekday().num_days_from_monday() as i64);
            *per_month.entry(monday.month()).or_default() += 1;
        }
        assert_eq!(per_month.len(), 12);
        assert!(per_month.values().all(|&n| n == 20));
    }

    #[test]
    fn test_holidays() {
        let cal = calendar();
        assert!(cal.is_holiday(date(2026, 1, 19)));
        assert!(cal.is_holiday(date(2026, 11, 27)));
        assert!(!cal.is_holiday(date(2026, 1, 20)));
    }

    #[test]
    fn test_rejects_non_monday_anchor() {
        let mut year = CalendarYear::la_2026().unwrap();
        year.anchors[0].monday = date(2026, 1, 6);
        let err = SweepCalendar::from_years(&[year]).unwrap_err();
        assert!(matches!(err, CalendarError::NotMonday(_, Weekday::Tue)));
    }

    #[test]
    fn test_rejects_missing_anchor() {
        let mut year = CalendarYear::la_2026().unwrap();
        year.anchors.remove(5);
        let err = SweepCalendar::from_years(&[year]).unwrap_err();
        assert!(matches!(
            err,
            CalendarError::AnchorCount { month: 2, found: 3, .. }
        ));
    }

    #[test]
    fn test_rejects_misnumbered_weeks() {
        let mut year = CalendarYear::la_2026().unwrap();
        year.anchors[1].week = 3;
        let err = SweepCalendar::from_years(&[year]).unwrap_err();
        assert!(matches!(err, CalendarError::WeekOrder { month: 1, .. }));
    }

    #[test]
    fn test_rejects_duplicate_year() {
        let year = CalendarYear::la_2026().unwrap();
        let err = SweepCalendar::from_years(&[year.clone(), year]).unwrap_err();
        assert!(matches!(err, CalendarError::DuplicateYear(2026)));
    }

    #[test]
    fn test_calendar_file_replaces_builtin_year() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("la2026.toml");
        let mut year = CalendarYear::la_2026().unwrap();
        year.holidays = vec![date(2026, 3, 9)];
        std::fs::write(&path, toml::to_string(&year).unwrap()).unwrap();

        let cal = SweepCalendar::load(&[path]).unwrap();
        assert!(cal.is_holiday(date(2026, 3, 9)));
        assert!(!cal.is_holiday(date(2026, 1, 19)));
    }

    #[test]
    fn test_unreadable_calendar_file() {
        let err = SweepCalendar::load(&[PathBuf::from("/nonexistent/cal.toml")]).unwrap_err();
        assert!(matches!(err, CalendarError::Io { .. }));
    }

    proptest! {
        #[test]
        fn prop_posted_dates_are_weekdays_with_valid_week(offset in 0i64..400) {
            let cal = calendar();
            let d = date(2026, 1, 1) + Duration::days(offset);
            if let Some(week) = cal.week_of(d) {
                prop_assert!(d.weekday().num_days_from_monday() < 5);
                prop_assert!((1..=4).contains(&week));
            }
        }
    }
}
