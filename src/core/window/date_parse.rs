//! Best-effort timestamp parsing
//!
//! Record sources disagree on timestamp formats. [`parse_datetime`] tries a
//! fixed list of explicit formats, then looks for a date (and optional time)
//! anywhere in the string, and gives up with `None` rather than an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Canonical rendering used for every timestamp Sextant writes
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Parse a timestamp in any supported format, `None` if nothing fits
///
/// ```
/// use sextant::core::window::parse_datetime;
///
/// assert!(parse_datetime("2021-03-04T10:11:12Z").is_some());
/// assert!(parse_datetime("04/03/2021").is_some());
/// assert!(parse_datetime("seen on 2021-03-04 at clinic").is_some());
/// assert!(parse_datetime("no date here").is_none());
/// ```
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    parse_explicit(s).or_else(|| parse_fuzzy(s))
}

fn parse_explicit(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
        }
    }
    None
}

fn fuzzy_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            (?:
                (?P<y1>\d{4})[-/](?P<m1>\d{1,2})[-/](?P<d1>\d{1,2})
              | (?P<d2>\d{1,2})[-/.](?P<m2>\d{1,2})[-/.](?P<y2>\d{4})
            )
            (?:[T\s]+(?P<h>\d{1,2}):(?P<min>\d{2})(?::(?P<s>\d{2}))?)?
            ",
        )
        .expect("fuzzy date pattern is valid")
    })
}

fn parse_fuzzy(s: &str) -> Option<DateTime<Utc>> {
    for caps in fuzzy_regex().captures_iter(s) {
        let num = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());
        let (year, month, day) = match (caps.name("y1"), caps.name("y2")) {
            (Some(y), _) => (y.as_str().parse::<i32>().ok()?, num("m1")?, num("d1")?),
            (None, Some(y)) => (y.as_str().parse::<i32>().ok()?, num("m2")?, num("d2")?),
            (None, None) => continue,
        };
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            continue;
        };
        let time = match (num("h"), num("min")) {
            (Some(h), Some(m)) => NaiveTime::from_hms_opt(h, m, num("s").unwrap_or(0)),
            _ => Some(NaiveTime::MIN),
        };
        if let Some(time) = time {
            return Some(Utc.from_utc_datetime(&date.and_time(time)));
        }
    }
    None
}
