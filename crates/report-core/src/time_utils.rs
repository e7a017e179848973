use std::fmt;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{ReportError, Result};

/// Format of the current-date stamp shown in the report.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of the timestamp embedded in artifact file names.
pub const PATH_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

// ── Timezones ─────────────────────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve a timezone name, `"auto"` meaning the system timezone.
///
/// Unrecognised names fall back to UTC with a warning.
pub fn resolve_timezone(name: &str) -> Tz {
    let name = if name == "auto" {
        get_system_timezone()
    } else {
        name.to_string()
    };
    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", name);
        Tz::UTC
    })
}

/// The instant a report run starts, in the report's timezone.
pub fn exec_time(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

// ── Date windows ──────────────────────────────────────────────────────────────

/// A half-open `[start, end)` range of calendar days requested upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// First day of the month `months` months before `today`.
pub fn months_back(today: NaiveDate, months: u32) -> Result<NaiveDate> {
    today
        .with_day(1)
        .and_then(|first| first.checked_sub_months(Months::new(months)))
        .ok_or_else(|| ReportError::Config(format!("{} months back is out of range", months)))
}

/// `today` minus `days` days.
pub fn days_back(today: NaiveDate, days: u64) -> Result<NaiveDate> {
    today
        .checked_sub_days(Days::new(days))
        .ok_or_else(|| ReportError::Config(format!("{} days back is out of range", days)))
}

/// First day of the month after `today`.
pub fn first_day_next_month(today: NaiveDate) -> Result<NaiveDate> {
    today
        .with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .ok_or_else(|| ReportError::Config(format!("no month follows {}", today)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
