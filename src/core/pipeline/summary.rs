//! Run summary and reporting

use super::context::FailureRecord;
use std::time::Duration;

/// Summary of one cohort run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Patients in the cohort
    pub total_patients: usize,

    /// Patients whose steps all ran, possibly with contained skips
    pub processed_patients: usize,

    /// Patients abandoned after a document retrieval failure
    pub failed_patients: usize,

    /// Contained failures (empty batches, skipped annotation sources)
    pub skipped_steps: usize,

    /// Batches obtained, cached or fetched
    pub batches: usize,

    /// Annotation files written during this run
    pub annotations_persisted: usize,

    /// Annotation files that already existed
    pub annotations_reused: usize,

    /// Sub-windows walked across all patients
    pub sub_windows: usize,

    /// Batch rows falling inside a sub-window
    pub rows_in_sub_windows: usize,

    /// The run stopped early on a shutdown signal
    pub interrupted: bool,

    pub duration: Duration,

    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// No patient failed, nothing was skipped and the run was not interrupted
    pub fn is_successful(&self) -> bool {
        self.failed_patients == 0 && self.skipped_steps == 0 && !self.interrupted
    }

    /// Share of the cohort processed, as a percentage
    pub fn completion_rate(&self) -> f64 {
        if self.total_patients == 0 {
            return 100.0;
        }
        (self.processed_patients as f64 / self.total_patients as f64) * 100.0
    }

    pub fn log_summary(&self) {
        tracing::info!(
            total_patients = self.total_patients,
            processed = self.processed_patients,
            failed = self.failed_patients,
            skipped_steps = self.skipped_steps,
            batches = self.batches,
            annotations_persisted = self.annotations_persisted,
            annotations_reused = self.annotations_reused,
            sub_windows = self.sub_windows,
            rows_in_sub_windows = self.rows_in_sub_windows,
            duration_secs = self.duration.as_secs(),
            completion = format!("{:.2}%", self.completion_rate()),
            "Run completed"
        );

        if self.interrupted {
            tracing::warn!("Run interrupted by shutdown signal; rerun to continue from the cache");
        }

        if !self.failures.is_empty() {
            tracing::warn!(failure_count = self.failures.len(), "Run completed with failures");
            for failure in &self.failures {
                tracing::warn!(
                    patient_id = %failure.patient_id,
                    scope = %failure.scope,
                    window = ?failure.window.map(|w| w.to_string()),
                    message = %failure.message,
                    "Run failure"
                );
            }
        }
    }
}
