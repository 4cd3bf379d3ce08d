//! Calendar week window derivation.
//!
//! A backup week runs Monday through Sunday and is identified by the
//! directory name `YYYY-MM-DD-to-YYYY-MM-DD`. The window is recomputed
//! on every run; nothing is persisted besides the directory itself.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::fmt;

/// The calendar week containing a given date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl WeekWindow {
    /// Window for the ISO week (Monday start) containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday() as i64;
        let start = date - Duration::days(offset);
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    /// Window containing the local wall-clock "today".
    pub fn current() -> Self {
        Self::containing(today())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Directory name for this window: `YYYY-MM-DD-to-YYYY-MM-DD`.
    pub fn dir_name(&self) -> String {
        format!("{}-to-{}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }
}

impl fmt::Display for WeekWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Local "today" as a naive date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Format a date the way marker directories are named.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
