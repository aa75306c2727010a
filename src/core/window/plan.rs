//! Window selection per patient

use super::global::{compute_global_window, widen_global_start};
use super::individual::build_individual_windows;
use crate::adapters::storage::Storage;
use crate::config::WindowConfig;
use crate::domain::context::ResultExt;
use crate::domain::{DateParts, Interval, PatientId, Result, TimeWindow};
use std::collections::BTreeMap;
use std::path::Path;

/// The global window plus any per-patient windows
#[derive(Debug, Clone)]
pub struct WindowPlan {
    global: TimeWindow,
    individual: BTreeMap<PatientId, TimeWindow>,
    lookback: bool,
    interval: Option<Interval>,
}

impl WindowPlan {
    pub fn new(global: TimeWindow, lookback: bool) -> Self {
        Self {
            global,
            individual: BTreeMap::new(),
            lookback,
            interval: None,
        }
    }

    /// Build the plan from configuration, reading the anchor table if configured
    ///
    /// # Errors
    ///
    /// Returns an error if the global window is unrepresentable or the anchor
    /// table cannot be read.
    pub fn from_config(config: &WindowConfig, storage: &dyn Storage) -> Result<Self> {
        let mut plan = Self::new(compute_global_window(config)?, config.lookback);
        plan.interval = config.interval;

        if let Some(ref individual) = config.individual {
            let table = storage
                .read_table(Path::new(&individual.patient_table))
                .with_context(|| format!("Failed to read window table {}", individual.patient_table))?;
            plan.individual = build_individual_windows(
                &table,
                &individual.id_column,
                &individual.anchor_column,
                individual.duration,
                config.lookback,
            );
        }
        Ok(plan)
    }

    pub fn global(&self) -> TimeWindow {
        self.global
    }

    pub fn lookback(&self) -> bool {
        self.lookback
    }

    pub fn interval(&self) -> Option<Interval> {
        self.interval
    }

    pub fn has_individual(&self) -> bool {
        !self.individual.is_empty()
    }

    /// Patients with an individual window, in id order
    pub fn individual_patients(&self) -> impl Iterator<Item = &PatientId> {
        self.individual.keys()
    }

    /// Window for one patient
    ///
    /// An individual window wins. Otherwise the global window is used, widened
    /// by the patient's start date when one is given.
    pub fn for_patient(&self, patient_id: &PatientId, start_date: Option<DateParts>) -> TimeWindow {
        if let Some(window) = self.individual.get(patient_id) {
            return *window;
        }
        match start_date {
            Some(candidate) => widen_global_start(self.global, candidate, self.lookback),
            None => self.global,
        }
    }
}
