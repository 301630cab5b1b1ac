//! Calendar date window iterated by the crawler

use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::constants::site;

/// Contiguous run of calendar days, starting at `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub days: u32,
}

impl DateWindow {
    pub const fn new(start: NaiveDate, days: u32) -> Self {
        Self { start, days }
    }

    /// Window of `days` days beginning with today's local date
    pub fn starting_today(days: u32) -> Self {
        Self::new(Local::now().date_naive(), days)
    }

    /// Dates in the window in chronological order
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.days).filter_map(move |offset| self.start.checked_add_days(Days::new(u64::from(offset))))
    }
}

/// Render a date the way the site expects it in URLs ("20250510")
pub fn format_listing_date(date: NaiveDate) -> String {
    date.format(site::DATE_FORMAT).to_string()
}

/// Parse an 8-digit year-month-day string
pub fn parse_listing_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(raw, site::DATE_FORMAT).ok()
}
