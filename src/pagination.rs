//! Page arithmetic and date-filter widening for the history view.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Page count and displayed page index for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub total_pages: i64,
    pub current_page: i64,
}

impl PageInfo {
    /// `total_pages` is `ceil(total_count / page_size)`.
    ///
    /// `current_page` is `floor(skip / page_size)` minus one once positive.
    /// Callers pass the skip of the *next* page, which is what the lag
    /// compensates for; existing pages depend on it.
    pub fn new(total_count: i64, page_size: i64, skip: i64) -> Self {
        if page_size <= 0 {
            return Self {
                total_pages: 0,
                current_page: 0,
            };
        }

        let mut total_pages = total_count / page_size;
        if total_count % page_size != 0 {
            total_pages += 1;
        }

        let mut current_page = skip / page_size;
        if current_page > 0 {
            current_page -= 1;
        }

        Self {
            total_pages,
            current_page,
        }
    }
}

/// Parse a `YYYY-MM-DD` form value. Anything unparseable means "no filter".
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).ok()
}

/// Lower bound used for a whole-day filter: 00:00:01 UTC.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    at(date, 0, 0, 1)
}

/// Upper bound used for a whole-day filter: 23:23:59 UTC.
pub fn day_end(date: NaiveDate) -> DateTime<Utc> {
    at(date, 23, 23, 59)
}

fn at(date: NaiveDate, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, min, sec).unwrap_or_default();
    date.and_time(time).and_utc()
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}
