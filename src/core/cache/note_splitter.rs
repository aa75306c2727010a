//! Clinical note splitting
//!
//! Long free-text notes are often a running log of dated entries. Each entry
//! begins on its own line with a date header (`dd/mm/yyyy` or `yyyy-mm-dd`,
//! optionally followed by `hh:mm`). Splitting turns one row into one row per
//! entry so each gets its own timestamp.

use crate::core::window::{format_timestamp, parse_datetime};
use crate::domain::Table;
use regex::Regex;
use std::sync::OnceLock;

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(\d{1,2}/\d{1,2}/\d{4}|\d{4}-\d{2}-\d{2})(?:[ \t]+(\d{1,2}:\d{2}))?")
            .unwrap()
    })
}

struct Piece<'a> {
    text: &'a str,
    timestamp: Option<String>,
}

fn pieces(text: &str) -> Vec<Piece<'_>> {
    let headers: Vec<_> = header_regex().captures_iter(text).collect();
    let mut out = Vec::with_capacity(headers.len() + 1);

    let Some(first) = headers.first().and_then(|c| c.get(0)) else {
        return out;
    };
    let preamble = text[..first.start()].trim();
    if !preamble.is_empty() {
        out.push(Piece {
            text: preamble,
            timestamp: None,
        });
    }

    for (i, caps) in headers.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let body = text[whole.start()..end].trim();
        if body.is_empty() {
            continue;
        }
        let stamp = match caps.get(2) {
            Some(time) => format!("{} {}", &caps[1], time.as_str()),
            None => caps[1].to_string(),
        };
        out.push(Piece {
            text: body,
            timestamp: parse_datetime(&stamp).map(|dt| format_timestamp(&dt)),
        });
    }
    out
}

/// Split every note in `text_column` at its date headers
///
/// Each piece keeps the row's other columns. Pieces whose header parses get
/// that timestamp, others keep the row's. Document ids get a `_<n>` suffix
/// counting from 1 in note order. Notes without headers are kept unchanged.
pub fn split_notes(
    table: &Table,
    text_column: &str,
    timestamp_column: &str,
    document_id_column: Option<&str>,
) -> Table {
    let mut out = table.empty_like();
    let mut split = 0usize;

    for row in table.iter() {
        let record = row.to_record();
        let parts = row.get(text_column).map(pieces).unwrap_or_default();
        if parts.len() < 2 {
            out.push_record(&record);
            continue;
        }

        split += 1;
        let base_id = document_id_column.and_then(|c| row.get(c));
        for (n, piece) in parts.into_iter().enumerate() {
            let mut piece_record = record.clone();
            piece_record.insert(text_column.to_string(), Some(piece.text.to_string()));
            if let Some(ts) = piece.timestamp {
                piece_record.insert(timestamp_column.to_string(), Some(ts));
            }
            if let (Some(column), Some(id)) = (document_id_column, base_id) {
                piece_record.insert(column.to_string(), Some(format!("{id}_{}", n + 1)));
            }
            out.push_record(&piece_record);
        }
    }

    if split > 0 {
        tracing::debug!(
            notes_split = split,
            rows_in = table.len(),
            rows_out = out.len(),
            "Split notes at date headers"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes(body: &str) -> Table {
        let mut table = Table::new(["client_idcode", "document_guid", "body_analysed", "updatetime"]);
        table
            .push_row(vec![
                Some("P1".to_string()),
                Some("D1".to_string()),
                Some(body.to_string()),
                Some("2021-05-01T00:00:00".to_string()),
            ])
            .unwrap();
        table
    }

    fn split(body: &str) -> Table {
        split_notes(&notes(body), "body_analysed", "updatetime", Some("document_guid"))
    }

    #[test]
    fn test_splits_at_headers() {
        let out = split("12/03/2021 09:15 Seen in clinic.\nBP fine.\n2021-04-02 Phone call, no change.");
        assert_eq!(out.len(), 2);
        assert_eq!(out.value(0, "updatetime"), Some("2021-03-12T09:15:00"));
        assert_eq!(out.value(0, "document_guid"), Some("D1_1"));
        assert!(out.value(0, "body_analysed").unwrap().ends_with("BP fine."));
        assert_eq!(out.value(1, "updatetime"), Some("2021-04-02T00:00:00"));
        assert_eq!(out.value(1, "document_guid"), Some("D1_2"));
        assert_eq!(out.value(1, "client_idcode"), Some("P1"));
    }

    #[test]
    fn test_preamble_keeps_row_timestamp() {
        let out = split("Summary of care\n01/02/2021 Admitted\n05/02/2021 Discharged");
        assert_eq!(out.len(), 3);
        assert_eq!(out.value(0, "body_analysed"), Some("Summary of care"));
        assert_eq!(out.value(0, "updatetime"), Some("2021-05-01T00:00:00"));
        assert_eq!(out.value(2, "document_guid"), Some("D1_3"));
    }

    #[test]
    fn test_note_without_headers_unchanged() {
        let table = notes("Nothing dated here, see 2021-01-01 inline.");
        let out = split_notes(&table, "body_analysed", "updatetime", Some("document_guid"));
        assert_eq!(out, table);
    }

    #[test]
    fn test_single_header_unchanged() {
        let table = notes("01/02/2021 Only one entry");
        let out = split_notes(&table, "body_analysed", "updatetime", Some("document_guid"));
        assert_eq!(out, table);
    }
}
