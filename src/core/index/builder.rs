//! Cohort-wide index dataset
//!
//! Runs the resolver once per patient, sequentially, and stacks the results
//! into one table with a row per patient.

use crate::adapters::storage::Storage;
use crate::core::pipeline::CohortMember;
use crate::core::resolve::{IndexEventRecord, RecordResolver, CANONICAL_TIMESTAMP, SOURCE_COLUMN};
use crate::core::window::WindowPlan;
use crate::domain::{PatientId, Result, Table, PATIENT_ID_COLUMN};
use std::collections::BTreeSet;
use std::path::Path;

/// Patient ids named by the `*.csv` files directly under `dir`
///
/// # Errors
///
/// Returns an error if the directory cannot be listed.
pub fn discover_patients(storage: &dyn Storage, dir: &Path) -> Result<Vec<PatientId>> {
    let ids: BTreeSet<PatientId> = storage
        .list_dir(dir)?
        .iter()
        .filter_map(|name| name.strip_suffix(".csv"))
        .filter_map(|stem| PatientId::new(stem).ok())
        .collect();
    tracing::info!(dir = %dir.display(), patients = ids.len(), "Discovered cohort from cache directory");
    Ok(ids.into_iter().collect())
}

/// Builds the one-row-per-patient index table
pub struct IndexBuilder {
    resolver: RecordResolver,
    alternate_column: String,
}

impl IndexBuilder {
    pub fn new(resolver: RecordResolver, alternate_column: impl Into<String>) -> Self {
        Self {
            resolver,
            alternate_column: alternate_column.into(),
        }
    }

    /// [`build_member_index`](Self::build_member_index) for patients without
    /// their own start dates
    pub fn build_cohort_index(&self, patients: &[PatientId], windows: &WindowPlan) -> Table {
        let members: Vec<CohortMember> = patients
            .iter()
            .map(|patient_id| CohortMember {
                patient_id: patient_id.clone(),
                start_date: None,
            })
            .collect();
        self.build_member_index(&members, windows)
    }

    /// Resolve every patient and concatenate the records
    ///
    /// Fallback rows are dated from the same window the run used for each
    /// patient, so a cohort start date moves them too. A patient whose
    /// annotation files cannot be read gets a fallback row. Afterwards
    /// `updatetime` and the alternate timestamp column fill each other's gaps.
    pub fn build_member_index(&self, members: &[CohortMember], windows: &WindowPlan) -> Table {
        let mut table = Table::new([
            PATIENT_ID_COLUMN,
            CANONICAL_TIMESTAMP,
            self.alternate_column.as_str(),
            SOURCE_COLUMN,
        ]);
        let mut fallbacks = 0usize;

        for (i, member) in members.iter().enumerate() {
            let patient_id = &member.patient_id;
            let window = windows.for_patient(patient_id, member.start_date);
            let record = match self
                .resolver
                .resolve_index_event(patient_id, &window, windows.lookback())
            {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        patient_id = %patient_id,
                        error = %e,
                        "Index resolution failed, using fallback"
                    );
                    self.resolver.fallback(patient_id, &window, windows.lookback())
                }
            };
            if record.is_fallback() {
                fallbacks += 1;
            }
            push_record(&mut table, &record);

            if (i + 1) % 500 == 0 {
                crate::log_progress!(i + 1, members.len(), fallbacks);
            }
        }

        self.fill_timestamps(&mut table);
        tracing::info!(
            patients = members.len(),
            resolved = members.len() - fallbacks,
            fallbacks,
            "Index dataset built"
        );
        table
    }

    fn fill_timestamps(&self, table: &mut Table) {
        let alternate = self.alternate_column.as_str();
        for row in 0..table.len() {
            let primary = table.value(row, CANONICAL_TIMESTAMP).map(String::from);
            let secondary = table.value(row, alternate).map(String::from);
            match (primary, secondary) {
                (None, Some(alt)) => table.set(row, CANONICAL_TIMESTAMP, Some(alt)),
                (Some(main), None) => table.set(row, alternate, Some(main)),
                _ => {}
            }
        }
    }
}

fn push_record(table: &mut Table, record: &IndexEventRecord) {
    for column in record.values.keys() {
        table.ensure_column(column);
    }
    table.push_record(&record.values);
}
