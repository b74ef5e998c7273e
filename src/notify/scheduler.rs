//! When the daily notification run fires.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// A fixed local time of day in a named time zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailySchedule {
    at: NaiveTime,
    tz: Tz,
}

impl DailySchedule {
    pub fn new(at: NaiveTime, tz: Tz) -> Self {
        Self { at, tz }
    }

    /// Parse an "HH:MM" time and an IANA zone name such as
    /// "America/Los_Angeles".
    pub fn parse(time: &str, timezone: &str) -> Result<Self> {
        let at = NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .with_context(|| format!("Invalid notification time '{}', expected HH:MM", time))?;
        let tz: Tz = timezone
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid time zone '{}': {}", timezone, e))?;
        Ok(Self { at, tz })
    }

    pub fn time(&self) -> NaiveTime {
        self.at
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// The local calendar date, which is the date sweep rules apply to.
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// First scheduled instant strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Tz>) -> DateTime<Tz> {
        let today = now.date_naive();
        let candidate = self.localize(today);
        if candidate > now {
            return candidate;
        }
        self.localize(today + Duration::days(1))
    }

    /// Time from `now` until `target`, zero if it has passed.
    pub fn duration_until(&self, target: DateTime<Tz>, now: DateTime<Tz>) -> std::time::Duration {
        (target - now).to_std().unwrap_or(std::time::Duration::ZERO)
    }

    fn localize(&self, date: NaiveDate) -> DateTime<Tz> {
        let naive = date.and_time(self.at);
        // Ambiguous fall-back times take the first occurrence
        if let Some(dt) = self.tz.from_local_datetime(&naive).earliest() {
            return dt;
        }
        // Spring-forward gap: the wall time does not exist, run an hour later
        let shifted = naive + Duration::hours(1);
        self.tz
            .from_local_datetime(&shifted)
            .earliest()
            .unwrap_or_else(|| self.tz.from_utc_datetime(&naive))
    }
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            at: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            tz: chrono_tz::America::Los_Angeles,
        }
    }
}
