//! Time window domain types
//!
//! A [`TimeWindow`] is always ascending: whatever direction it was specified in,
//! `start <= end` holds once it exists. [`Interval`] is a calendar-aware duration
//! (months and days), so that "1 month" steps from Jan 31st land on Feb 28th/29th
//! instead of drifting by a fixed number of days.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Year/month/day triple as configured, before it becomes a date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DateParts {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// Canonical zero-padded `YYYY-MM-DD` rendering
    pub fn padded(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// Midnight UTC on this date, `None` if the triple is not a real date
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day)?;
        Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
    }

    /// Like [`DateParts::to_datetime`] but clamps the day to the month's last day
    pub fn to_datetime_clamped(&self) -> Option<DateTime<Utc>> {
        let month = self.month.clamp(1, 12);
        let last = last_day_of_month(self.year, month)?;
        DateParts::new(self.year, month, self.day.clamp(1, last)).to_datetime()
    }

    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self::new(dt.year(), dt.month(), dt.day())
    }
}

impl fmt::Display for DateParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.padded())
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(first_next.pred_opt()?.day())
}

/// An ascending `[start, end]` pair of instants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window from two endpoints in either order
    pub fn new(a: DateTime<Utc>, b: DateTime<Utc>) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Inclusive containment
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start && *ts <= self.end
    }

    pub fn span(&self) -> chrono::Duration {
        self.end - self.start
    }

    /// `(start, end)` rendered as padded `YYYY-MM-DD`
    pub fn date_bounds(&self) -> (String, String) {
        (
            self.start.format("%Y-%m-%d").to_string(),
            self.end.format("%Y-%m-%d").to_string(),
        )
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (s, e) = self.date_bounds();
        write!(f, "{s}..{e}")
    }
}

/// Calendar-aware duration made of whole months and whole days
///
/// Parsed from compact strings: `"1d"`, `"2w"`, `"3m"`, `"1y"`, or combinations
/// such as `"1y6m"`.
///
/// ```
/// use sextant::domain::window::Interval;
/// use std::str::FromStr;
///
/// let interval = Interval::from_str("1y6m").unwrap();
/// assert_eq!(interval.months(), 18);
/// assert_eq!(interval.days(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    months: u32,
    days: u64,
}

impl Interval {
    /// Create an interval; zero-length intervals are rejected
    pub fn new(months: u32, days: u64) -> Result<Self, String> {
        if months == 0 && days == 0 {
            return Err("interval must be longer than zero".to_string());
        }
        Ok(Self { months, days })
    }

    pub fn days_only(days: u64) -> Result<Self, String> {
        Self::new(0, days)
    }

    pub fn months(&self) -> u32 {
        self.months
    }

    pub fn days(&self) -> u64 {
        self.days
    }

    /// `dt + self`, `None` on calendar overflow
    pub fn add_to(&self, dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
        dt.checked_add_months(Months::new(self.months))?
            .checked_add_days(Days::new(self.days))
    }

    /// `dt - self`, `None` on calendar overflow
    pub fn sub_from(&self, dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
        dt.checked_sub_months(Months::new(self.months))?
            .checked_sub_days(Days::new(self.days))
    }
}

fn interval_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*([dwmy])").expect("interval pattern is valid"))
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err("interval cannot be empty".to_string());
        }
        let re = interval_regex();
        let consumed: usize = re.find_iter(&compact).map(|m| m.len()).sum();
        if consumed != compact.len() {
            return Err(format!(
                "invalid interval '{s}'. Expected e.g. '1d', '2w', '1m', '1y6m'"
            ));
        }

        let mut months: u32 = 0;
        let mut days: u64 = 0;
        for cap in re.captures_iter(&compact) {
            let n: u64 = cap[1]
                .parse()
                .map_err(|_| format!("invalid number in interval '{s}'"))?;
            match &cap[2] {
                "d" => days += n,
                "w" => days += n * 7,
                "m" => months += u32::try_from(n).map_err(|_| format!("interval too large: {s}"))?,
                "y" => {
                    months += u32::try_from(n * 12).map_err(|_| format!("interval too large: {s}"))?
                }
                _ => unreachable!("regex only matches d, w, m or y"),
            }
        }
        Self::new(months, days)
    }
}

impl TryFrom<String> for Interval {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let years = self.months / 12;
        let months = self.months % 12;
        if years > 0 {
            write!(f, "{years}y")?;
        }
        if months > 0 {
            write!(f, "{months}m")?;
        }
        if self.days > 0 {
            write!(f, "{}d", self.days)?;
        }
        Ok(())
    }
}
