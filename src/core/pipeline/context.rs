//! Shared run accounting
//!
//! One [`RunContext`] is created per run and handed to every component as an
//! `Arc`, so skip counts and failures survive across patients and workers.

use crate::domain::TimeWindow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A recorded per-patient failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub patient_id: String,

    /// What was being done, e.g. a data type or annotation source name
    pub scope: String,

    pub window: Option<TimeWindow>,

    pub message: String,
}

/// Counters and failure log for one run
#[derive(Debug, Default)]
pub struct RunContext {
    skipped: AtomicUsize,
    processed: AtomicUsize,
    failures: Mutex<Vec<FailureRecord>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a skip and remember why
    pub fn record_skip(
        &self,
        patient_id: impl Into<String>,
        scope: impl Into<String>,
        window: Option<TimeWindow>,
        message: impl Into<String>,
    ) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        let record = FailureRecord {
            patient_id: patient_id.into(),
            scope: scope.into(),
            window,
            message: message.into(),
        };
        // A poisoned lock only means another thread panicked mid-push
        let mut failures = self
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        failures.push(record);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Snapshot of the failure log in recording order
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
