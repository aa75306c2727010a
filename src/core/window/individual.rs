//! Per-patient windows anchored on a timestamp column

use super::date_parse::parse_datetime;
use crate::domain::{Interval, PatientId, Table, TimeWindow};
use std::collections::BTreeMap;

/// Build one window per patient from an anchor timestamp and a fixed duration
///
/// Forward windows run `[anchor, anchor + duration]`, lookback windows
/// `[anchor - duration, anchor]`. Rows with a missing id, an unparseable anchor
/// or an unrepresentable endpoint are skipped with a warning. When a patient
/// appears more than once the first row wins.
pub fn build_individual_windows(
    table: &Table,
    id_column: &str,
    anchor_column: &str,
    duration: Interval,
    lookback: bool,
) -> BTreeMap<PatientId, TimeWindow> {
    let mut windows = BTreeMap::new();

    for row in table.iter() {
        let Some(id) = row.get(id_column).and_then(|raw| PatientId::new(raw).ok()) else {
            tracing::warn!(row = row.index(), "Row has no usable patient id, skipped");
            continue;
        };
        if windows.contains_key(&id) {
            tracing::debug!(patient_id = %id, "Duplicate anchor row ignored");
            continue;
        }
        let Some(anchor) = row.get(anchor_column).and_then(parse_datetime) else {
            tracing::warn!(
                patient_id = %id,
                column = anchor_column,
                "Anchor timestamp missing or unparseable, patient has no individual window"
            );
            continue;
        };
        let other = if lookback {
            duration.sub_from(anchor)
        } else {
            duration.add_to(anchor)
        };
        let Some(other) = other else {
            tracing::warn!(patient_id = %id, "Individual window endpoint out of range");
            continue;
        };
        windows.insert(id, TimeWindow::new(anchor, other));
    }

    tracing::info!(
        patients = windows.len(),
        rows = table.len(),
        "Individual windows built"
    );
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn anchors() -> Table {
        let mut table = Table::new(["client_idcode", "anchor"]);
        for (id, ts) in [
            ("P1", Some("2021-06-15")),
            ("P2", Some("garbage")),
            ("P1", Some("2019-01-01")),
            ("", Some("2021-01-01")),
            ("P3", None),
        ] {
            table
                .push_row(vec![Some(id.to_string()), ts.map(String::from)])
                .unwrap();
        }
        table
    }

    #[test]
    fn test_forward_windows() {
        let windows = build_individual_windows(
            &anchors(),
            "client_idcode",
            "anchor",
            Interval::from_str("1y").unwrap(),
            false,
        );
        assert_eq!(windows.len(), 1);
        let p1 = windows[&PatientId::new("P1").unwrap()];
        assert_eq!(
            p1.date_bounds(),
            ("2021-06-15".to_string(), "2022-06-15".to_string())
        );
    }

    #[test]
    fn test_lookback_windows_are_ascending() {
        let windows = build_individual_windows(
            &anchors(),
            "client_idcode",
            "anchor",
            Interval::from_str("6m").unwrap(),
            true,
        );
        let p1 = windows[&PatientId::new("P1").unwrap()];
        assert!(p1.start() < p1.end());
        assert_eq!(
            p1.date_bounds(),
            ("2020-12-15".to_string(), "2021-06-15".to_string())
        );
    }
}
