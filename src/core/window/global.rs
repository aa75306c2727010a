//! Global window normalisation and per-patient widening

use crate::config::WindowConfig;
use crate::domain::{DateParts, Result, SextantError, TimeWindow};
use chrono::{DateTime, Utc};

fn resolve_parts(label: &str, parts: DateParts) -> Result<DateTime<Utc>> {
    if let Some(dt) = parts.to_datetime() {
        return Ok(dt);
    }
    let clamped = parts.to_datetime_clamped().ok_or_else(|| {
        SextantError::Validation(format!("window {label} date {parts} is out of range"))
    })?;
    tracing::warn!(
        configured = %parts,
        used = %DateParts::from_datetime(&clamped),
        "Window {} day does not exist in its month, clamped",
        label
    );
    Ok(clamped)
}

/// Normalise the configured start/end into an ascending window
///
/// Without lookback the configured start is the lower bound. With lookback the
/// configured start is the anchor the walk goes back from, so the pair is
/// swapped once. A pair that still comes out inverted is swapped back and
/// reported.
///
/// # Errors
///
/// Returns a validation error if a configured date cannot be represented even
/// after clamping its day.
pub fn compute_global_window(config: &WindowConfig) -> Result<TimeWindow> {
    let start = resolve_parts("start", config.start_parts())?;
    let end = resolve_parts("end", config.end_parts())?;

    let (lower, upper) = if config.lookback {
        (end, start)
    } else {
        (start, end)
    };

    if lower > upper {
        tracing::warn!(
            start = %config.start_parts(),
            end = %config.end_parts(),
            lookback = config.lookback,
            "Configured window endpoints are inverted, using them in ascending order"
        );
    }

    let window = TimeWindow::new(lower, upper);
    tracing::debug!(window = %window, lookback = config.lookback, "Global window resolved");
    Ok(window)
}

/// Advance the window start towards a patient-provided start date
///
/// Each of year, month and day is raised independently to the candidate's value
/// when the candidate's field is larger. Lookback windows are never touched. If
/// the advanced start would pass the window end the window is returned
/// unchanged and the conflict is logged.
pub fn widen_global_start(window: TimeWindow, candidate: DateParts, lookback: bool) -> TimeWindow {
    if lookback {
        return window;
    }

    let mut parts = DateParts::from_datetime(&window.start());
    if candidate.year > parts.year {
        parts.year = candidate.year;
    }
    if candidate.month > parts.month {
        parts.month = candidate.month;
    }
    if candidate.day > parts.day {
        parts.day = candidate.day;
    }

    let Ok(start) = resolve_parts("start", parts) else {
        tracing::warn!(candidate = %candidate, "Patient start date is out of range, ignored");
        return window;
    };

    if start > window.end() {
        tracing::warn!(
            candidate = %candidate,
            advanced_start = %DateParts::from_datetime(&start),
            window_end = %DateParts::from_datetime(&window.end()),
            "Advanced start passes the window end, keeping the global window"
        );
        return window;
    }

    TimeWindow::new(start, window.end())
}
