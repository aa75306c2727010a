//! Search query strings

use crate::domain::{DataType, TimeWindow};

/// Query for one data type over an inclusive date range
///
/// ```
/// use sextant::core::cache::build_query;
/// use sextant::domain::{DataType, DateParts, TimeWindow};
///
/// let window = TimeWindow::new(
///     DateParts::new(2020, 1, 1).to_datetime().unwrap(),
///     DateParts::new(2020, 12, 31).to_datetime().unwrap(),
/// );
/// assert_eq!(
///     build_query(DataType::EprDocuments, &window),
///     "updatetime:[2020-01-01 TO 2020-12-31]"
/// );
/// ```
pub fn build_query(data_type: DataType, window: &TimeWindow) -> String {
    let spec = data_type.spec();
    let (start, end) = window.date_bounds();
    let range = format!("{}:[{} TO {}]", spec.timestamp_column, start, end);
    match spec.filter {
        Some(filter) => format!("{filter} AND {range}"),
        None => range,
    }
}
