//! Splitting a window into contiguous sub-windows

use super::date_parse::parse_datetime;
use crate::domain::{Interval, Table, TimeWindow};
use chrono::{DateTime, Utc};

/// Ascending sequence of contiguous sub-windows covering a window
///
/// Single pass: the sequence is consumed by iteration and cannot be rewound.
/// Forward walks start at the window start and leave any short remainder at
/// the end; lookback walks start at the window end and leave it at the start.
/// Either way at least one sub-window is produced and the last one ends
/// exactly at the window end.
#[derive(Debug)]
pub struct SubWindows {
    inner: Walk,
}

#[derive(Debug)]
enum Walk {
    Forward {
        cursor: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
        done: bool,
    },
    Collected(std::vec::IntoIter<TimeWindow>),
}

/// Split `window` into sub-windows of length `interval`
pub fn generate_sub_windows(window: TimeWindow, interval: Interval, lookback: bool) -> SubWindows {
    let inner = if lookback {
        Walk::Collected(walk_back(window, interval).into_iter())
    } else {
        Walk::Forward {
            cursor: window.start(),
            end: window.end(),
            interval,
            done: false,
        }
    };
    SubWindows { inner }
}

fn walk_back(window: TimeWindow, interval: Interval) -> Vec<TimeWindow> {
    let mut out = Vec::new();
    let mut cursor = window.end();
    loop {
        match interval.sub_from(cursor) {
            Some(prev) if prev > window.start() => {
                out.push(TimeWindow::new(prev, cursor));
                cursor = prev;
            }
            _ => {
                out.push(TimeWindow::new(window.start(), cursor));
                break;
            }
        }
    }
    out.reverse();
    out
}

impl Iterator for SubWindows {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        match &mut self.inner {
            Walk::Collected(items) => items.next(),
            Walk::Forward {
                cursor,
                end,
                interval,
                done,
            } => {
                if *done {
                    return None;
                }
                match interval.add_to(*cursor) {
                    Some(next) if next < *end => {
                        let item = TimeWindow::new(*cursor, next);
                        *cursor = next;
                        Some(item)
                    }
                    _ => {
                        *done = true;
                        Some(TimeWindow::new(*cursor, *end))
                    }
                }
            }
        }
    }
}

/// Rows of `table` whose `ts_column` falls in `window`
///
/// Sub-windows are half-open `[start, end)` so a row on a shared boundary lands
/// in exactly one of them; pass `end_inclusive` for the final sub-window.
/// Rows whose timestamp is missing or unparseable are dropped.
pub fn slice_window(table: &Table, ts_column: &str, window: &TimeWindow, end_inclusive: bool) -> Table {
    let indices: Vec<usize> = table
        .iter()
        .filter_map(|row| {
            let ts = parse_datetime(row.get(ts_column)?)?;
            let below_end = if end_inclusive {
                ts <= window.end()
            } else {
                ts < window.end()
            };
            (ts >= window.start() && below_end).then(|| row.index())
        })
        .collect();
    table.select_rows(&indices)
}
