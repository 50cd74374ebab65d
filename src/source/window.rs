use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// Inclusive creation-date range used to select input records.
///
/// A window is fixed for the lifetime of a run, which is what lets a restarted
/// run re-derive exactly the same input set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl QueryWindow {
    /// Build a window covering `start..=end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PipelineError> {
        if start > end {
            return Err(PipelineError::Configuration(format!(
                "query window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The whole calendar month before the month containing `as_of`.
    ///
    /// `2026-10-16` yields `2026-09-01..=2026-09-30`; `2026-01-05` yields
    /// `2025-12-01..=2025-12-31`.
    pub fn previous_month(as_of: NaiveDate) -> Result<Self, PipelineError> {
        let out_of_range =
            || PipelineError::Configuration(format!("no previous month exists for {as_of}"));
        let first_of_current =
            NaiveDate::from_ymd_opt(as_of.year(), as_of.month(), 1).ok_or_else(out_of_range)?;
        let end = first_of_current.pred_opt().ok_or_else(out_of_range)?;
        let start = NaiveDate::from_ymd_opt(end.year(), end.month(), 1).ok_or_else(out_of_range)?;
        Self::new(start, end)
    }

    /// First day included in the window.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day included in the window.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Returns `true` when `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for QueryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Parse an `as_of` date written as `YYYY-MM-DD` or `MM-DD-YYYY`.
pub fn parse_as_of_date(raw: &str) -> Option<NaiveDate> {
    let normalized = raw.trim().replace('_', "-");
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%m-%d-%Y") {
        return Some(date);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn previous_month_covers_whole_month() {
        let window = QueryWindow::previous_month(date(2026, 10, 16)).unwrap();
        assert_eq!(window.start(), date(2026, 9, 1));
        assert_eq!(window.end(), date(2026, 9, 30));
        assert_eq!(window.to_string(), "2026-09-01..2026-09-30");
    }

    #[test]
    fn previous_month_crosses_year_boundary() {
        let window = QueryWindow::previous_month(date(2026, 1, 1)).unwrap();
        assert_eq!(window.start(), date(2025, 12, 1));
        assert_eq!(window.end(), date(2025, 12, 31));
    }

    #[test]
    fn previous_month_handles_leap_february() {
        let window = QueryWindow::previous_month(date(2024, 3, 31)).unwrap();
        assert_eq!(window.end(), date(2024, 2, 29));
    }

    #[test]
    fn contains_is_inclusive_on_both_ends() {
        let window = QueryWindow::new(date(2026, 9, 1), date(2026, 9, 30)).unwrap();
        assert!(window.contains(date(2026, 9, 1)));
        assert!(window.contains(date(2026, 9, 30)));
        assert!(!window.contains(date(2026, 8, 31)));
        assert!(!window.contains(date(2026, 10, 1)));
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert!(QueryWindow::new(date(2026, 9, 30), date(2026, 9, 1)).is_err());
    }

    #[test]
    fn as_of_accepts_both_date_orders() {
        assert_eq!(parse_as_of_date("2026-10-16"), Some(date(2026, 10, 16)));
        assert_eq!(parse_as_of_date("10-16-2026"), Some(date(2026, 10, 16)));
        assert_eq!(parse_as_of_date("2026_10_16"), Some(date(2026, 10, 16)));
        assert_eq!(parse_as_of_date("yesterday"), None);
    }
}
