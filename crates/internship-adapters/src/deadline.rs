//! Deadline and listing-date parsing.
//!
//! Listings carry dates as short text such as `"24 Jan' 24"`. Only the twelve
//! English month abbreviations are recognized.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate};
use internship_core::DeadlineStatus;
use regex::Regex;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn deadline_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)([0-9]{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)(?:'|’)?\s*([0-9]{2})?")
            .expect("deadline pattern is valid")
    })
}

struct TextualDate {
    day: i64,
    month: u32,
    year: Option<i32>,
}

fn match_textual_date(text: &str) -> Option<TextualDate> {
    let caps = deadline_pattern().captures(text)?;
    let day = caps.get(1)?.as_str().parse::<i64>().ok()?;
    let month_token = caps.get(2)?.as_str().to_ascii_lowercase();
    let month = MONTHS.iter().position(|m| *m == month_token)? as u32 + 1;
    let year = caps
        .get(3)
        .and_then(|m| format!("20{}", m.as_str()).parse::<i32>().ok());
    Some(TextualDate { day, month, year })
}

/// Builds a calendar date, rolling day overflow into the following month
/// (`31 Feb` -> `3 Mar` or `2 Mar`) and day `0` back to the previous month end.
fn rolled_date(year: i32, month: u32, day: i64) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_signed(Duration::days(day - 1))
}

/// Deadline as a calendar date. A missing year means the calendar year of `today`.
pub fn parse_deadline_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let parsed = match_textual_date(text)?;
    rolled_date(parsed.year.unwrap_or(today.year()), parsed.month, parsed.day)
}

pub fn deadline_status_on(deadline: Option<&str>, today: NaiveDate) -> DeadlineStatus {
    let Some(text) = deadline.filter(|t| !t.trim().is_empty()) else {
        return DeadlineStatus::NoDeadline;
    };
    match parse_deadline_date(text, today) {
        Some(date) => DeadlineStatus::from_day_difference((date - today).num_days()),
        None => DeadlineStatus::NoDeadline,
    }
}

/// Whole days until the deadline, never negative. `None` when there is no
/// recognizable deadline.
pub fn days_left_on(deadline: Option<&str>, today: NaiveDate) -> Option<u32> {
    deadline_status_on(deadline, today).days_left()
}

pub fn days_left(deadline: Option<&str>) -> Option<u32> {
    days_left_on(deadline, Local::now().date_naive())
}

/// Best-effort date for sorting listing fields (`startDate`, `postedOn`, `applyBy`).
pub fn parse_listing_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.date_naive());
    }
    for format in ["%Y-%m-%d", "%d %b %Y", "%d %B %Y", "%b %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    let parsed = match_textual_date(text)?;
    rolled_date(parsed.year?, parsed.month, parsed.day)
}

/// Seconds since the epoch for a listing date; unparseable or empty text is `0`.
pub fn listing_timestamp(text: &str) -> i64 {
    parse_listing_date(text)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}
