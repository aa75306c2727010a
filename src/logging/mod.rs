//! Logging and observability
//!
//! Structured `tracing` output with a console layer and an optional rotating
//! JSON file layer, plus a few macros for the events every run emits.
//!
//! ```no_run
//! use sextant::logging::init_logging;
//! use sextant::config::LoggingConfig;
//!
//! let _guard = init_logging("info", &LoggingConfig::console_only()).expect("logging");
//! tracing::info!(patient_id = "V001", "Processing patient");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log a patient/data-type pair skipped after a recoverable failure
///
/// # Example
///
/// ```no_run
/// use sextant::log_patient_skip;
///
/// let err = "search timed out";
/// log_patient_skip!("V001", "bloods", err);
/// ```
#[macro_export]
macro_rules! log_patient_skip {
    ($patient_id:expr, $scope:expr, $error:expr) => {
        tracing::warn!(
            patient_id = %$patient_id,
            scope = %$scope,
            error = %$error,
            "Skipping after recoverable failure"
        );
    };
}

/// Log a batch obtained from the cache or the search service
///
/// # Example
///
/// ```no_run
/// use sextant::log_batch_fetched;
///
/// log_batch_fetched!("V001", "epr_documents", 12, true);
/// ```
#[macro_export]
macro_rules! log_batch_fetched {
    ($patient_id:expr, $data_type:expr, $rows:expr, $from_cache:expr) => {
        tracing::debug!(
            patient_id = %$patient_id,
            data_type = %$data_type,
            rows = $rows,
            from_cache = $from_cache,
            "Batch ready"
        );
    };
}

/// Log progress through the cohort
///
/// # Example
///
/// ```no_run
/// use sextant::log_progress;
///
/// log_progress!(25, 100, 3);
/// ```
#[macro_export]
macro_rules! log_progress {
    ($current:expr, $total:expr, $skipped:expr) => {
        tracing::info!(
            current = $current,
            total = $total,
            skipped = $skipped,
            progress_pct = if $total == 0 {
                100.0
            } else {
                $current as f64 / $total as f64 * 100.0
            },
            "Cohort progress"
        );
    };
}
