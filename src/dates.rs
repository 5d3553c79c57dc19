// 📅 Calendar dates - one parser for every date column
//
// Unparseable means None. Callers exclude those rows; nothing is ever
// defaulted to an arbitrary date.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a calendar date from the formats seen in source files
///
/// Accepts `YYYY-MM-DD`, `MM/DD/YYYY`, RFC 3339 timestamps and naive
/// `YYYY-MM-DDTHH:MM:SS` timestamps (time of day is dropped).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }

    None
}

/// Whole years between `birth` and `as_of`. None if `as_of` precedes birth.
pub fn age_on(birth: NaiveDate, as_of: NaiveDate) -> Option<u32> {
    if as_of < birth {
        return None;
    }

    let mut years = as_of.year() - birth.year();
    if (as_of.month(), as_of.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }

    u32::try_from(years).ok()
}

/// `date` minus whole years, clamping Feb 29 to Feb 28
pub fn years_before(date: NaiveDate, years: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(years * 12))
        .unwrap_or(NaiveDate::MIN)
}
