//! Folding one-hot date-bucket columns back into a timestamp
//!
//! Vectorised outputs encode a row's date as a set of `date_bucket_<date>`
//! columns of which one is set. `<date>` is `YYYY`, `YYYY_MM`, `YYYY_MM_DD` or
//! the same with `-` separators; omitted parts default to the first.

use crate::core::window::format_timestamp;
use crate::domain::{DateParts, Table};

/// Prefix of one-hot date columns
pub const DATE_BUCKET_PREFIX: &str = "date_bucket_";

/// Column receiving the decoded timestamp
pub const DECODED_COLUMN: &str = "timestamp";

fn bucket_date(column: &str) -> Option<String> {
    let suffix = column.strip_prefix(DATE_BUCKET_PREFIX)?;
    let mut parts = suffix.split(['_', '-']).map(|p| p.parse::<u32>().ok());
    let year = i32::try_from(parts.next()??).ok()?;
    let month = parts.next().unwrap_or(Some(1))?;
    let day = parts.next().unwrap_or(Some(1))?;
    if parts.next().is_some() {
        return None;
    }
    let dt = DateParts::new(year, month, day).to_datetime()?;
    Some(format_timestamp(&dt))
}

fn is_set(value: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => true,
        other => other.parse::<f64>().is_ok_and(|v| v != 0.0),
    }
}

/// Replace `date_bucket_*` columns with a single [`DECODED_COLUMN`]
///
/// Each row takes the date of its first set bucket in column order, or null if
/// none is set. Bucket columns whose suffix is not a date are left alone.
/// Returns the number of columns folded.
pub fn decode_date_buckets(table: &mut Table) -> usize {
    let buckets: Vec<(String, String)> = table
        .columns()
        .iter()
        .filter_map(|c| bucket_date(c).map(|date| (c.clone(), date)))
        .collect();
    if buckets.is_empty() {
        return 0;
    }

    let decoded: Vec<Option<String>> = table
        .iter()
        .map(|row| {
            buckets
                .iter()
                .find(|(column, _)| row.get(column).is_some_and(is_set))
                .map(|(_, date)| date.clone())
        })
        .collect();

    table.ensure_column(DECODED_COLUMN);
    for (row, value) in decoded.into_iter().enumerate() {
        table.set(row, DECODED_COLUMN, value);
    }
    for (column, _) in &buckets {
        table.drop_column(column);
    }

    tracing::debug!(columns = buckets.len(), rows = table.len(), "Decoded date buckets");
    buckets.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("date_bucket_2021_03_04", Some("2021-03-04T00:00:00"); "full date")]
    #[test_case("date_bucket_2021-03", Some("2021-03-01T00:00:00"); "year month dashed")]
    #[test_case("date_bucket_2021", Some("2021-01-01T00:00:00"); "year only")]
    #[test_case("date_bucket_2021_13", None; "bad month")]
    #[test_case("date_bucket_recent", None; "not a date")]
    #[test_case("age", None; "not a bucket")]
    fn test_bucket_date(column: &str, expected: Option<&str>) {
        assert_eq!(bucket_date(column).as_deref(), expected);
    }

    #[test]
    fn test_decode() {
        let mut table = Table::new(["id", "date_bucket_2020_01", "date_bucket_2020_02", "date_bucket_other"]);
        for row in [
            ["a", "1", "0", "1"],
            ["b", "0.0", "1.0", "0"],
            ["c", "0", "", "0"],
        ] {
            table
                .push_row(row.iter().map(|v| Some(v.to_string())).collect())
                .unwrap();
        }

        assert_eq!(decode_date_buckets(&mut table), 2);
        assert_eq!(table.columns(), ["id", "date_bucket_other", "timestamp"]);
        assert_eq!(table.value(0, "timestamp"), Some("2020-01-01T00:00:00"));
        assert_eq!(table.value(1, "timestamp"), Some("2020-02-01T00:00:00"));
        assert_eq!(table.value(2, "timestamp"), None);
    }
}
