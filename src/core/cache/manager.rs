//! Batch cache manager
//!
//! Each `(patient, data type)` pair has one deterministic cache file. A cached
//! batch is returned without contacting the search service. Otherwise the
//! batch is fetched for the whole window, post-filtered, cleaned of rows with
//! missing mandatory values, persisted and returned.

use super::filters::PostFilters;
use super::query::build_query;
use crate::adapters::search::{CohortSearch, SearchRequest};
use crate::adapters::storage::Storage;
use crate::config::BatchConfig;
use crate::core::pipeline::RunContext;
use crate::domain::{DataType, PatientId, Result, SextantError, Table, TimeWindow};
use crate::{log_batch_fetched, log_patient_skip};
use std::path::PathBuf;
use std::sync::Arc;

/// Cache file for one patient and data type, relative to the storage root
pub fn cache_path(patient_id: &PatientId, data_type: DataType) -> PathBuf {
    PathBuf::from(data_type.spec().cache_dir).join(format!("{}.csv", patient_id.as_str()))
}

/// A batch plus whether it replaces a failed retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedBatch {
    pub table: Table,
    /// Empty stand-in after a contained failure; nothing was cached
    pub degraded: bool,
}

/// Fetches per-patient batches through the cache
pub struct BatchCacheManager {
    storage: Arc<dyn Storage>,
    search: Arc<dyn CohortSearch>,
    filters: PostFilters,
    force_overwrite: bool,
    dry_run: bool,
    context: Arc<RunContext>,
}

impl BatchCacheManager {
    /// # Errors
    ///
    /// Returns a configuration error if the post-filter settings are invalid.
    pub fn new(
        storage: Arc<dyn Storage>,
        search: Arc<dyn CohortSearch>,
        config: &BatchConfig,
        dry_run: bool,
        context: Arc<RunContext>,
    ) -> Result<Self> {
        Ok(Self {
            storage,
            search,
            filters: PostFilters::from_config(config)?,
            force_overwrite: config.force_overwrite,
            dry_run,
            context,
        })
    }

    /// Whether a cache file exists for the pair
    pub fn is_cached(&self, patient_id: &PatientId, data_type: DataType) -> Result<bool> {
        self.storage.exists(&cache_path(patient_id, data_type))
    }

    /// Batch for `patient_id` covering `window`
    ///
    /// Failures are contained: the patient is counted as skipped and an empty
    /// batch with the data type's columns is returned.
    ///
    /// # Errors
    ///
    /// EPR documents are the exception. Without them nothing downstream can
    /// run, so their failures are returned as
    /// [`SextantError::BatchRetrievalFailed`].
    pub async fn get_batch(
        &self,
        patient_id: &PatientId,
        data_type: DataType,
        window: &TimeWindow,
    ) -> Result<Table> {
        self.fetch_batch(patient_id, data_type, window)
            .await
            .map(|batch| batch.table)
    }

    /// Like [`get_batch`](Self::get_batch), but says whether the batch is a
    /// stand-in for a failed retrieval
    ///
    /// A degraded batch must not be annotated: the empty annotation file would
    /// mark the pair done and hide the real documents from later runs.
    ///
    /// # Errors
    ///
    /// Same as [`get_batch`](Self::get_batch).
    pub async fn fetch_batch(
        &self,
        patient_id: &PatientId,
        data_type: DataType,
        window: &TimeWindow,
    ) -> Result<FetchedBatch> {
        match self.try_get_batch(patient_id, data_type, window).await {
            Ok(table) => Ok(FetchedBatch {
                table,
                degraded: false,
            }),
            Err(e) if data_type.is_critical() => {
                tracing::error!(
                    patient_id = %patient_id,
                    data_type = %data_type,
                    error = %e,
                    "Document batch retrieval failed"
                );
                Err(SextantError::BatchRetrievalFailed {
                    patient_id: patient_id.to_string(),
                    data_type: data_type.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                log_patient_skip!(patient_id, data_type, e);
                self.context
                    .record_skip(patient_id.as_str(), data_type.name(), Some(*window), e.to_string());
                Ok(FetchedBatch {
                    table: Table::new(data_type.spec().fields.iter().copied()),
                    degraded: true,
                })
            }
        }
    }

    async fn try_get_batch(
        &self,
        patient_id: &PatientId,
        data_type: DataType,
        window: &TimeWindow,
    ) -> Result<Table> {
        let path = cache_path(patient_id, data_type);

        if !self.force_overwrite && self.storage.exists(&path)? {
            let table = self.storage.read_table(&path)?;
            log_batch_fetched!(patient_id, data_type, table.len(), true);
            return Ok(table);
        }

        let spec = data_type.spec();
        let request = SearchRequest {
            index: spec.index.to_string(),
            fields: spec.fields.iter().map(|f| f.to_string()).collect(),
            id_field: spec.id_field().to_string(),
            id_values: vec![patient_id.to_string()],
            query: build_query(data_type, window),
        };
        let raw = self.search.search(&request).await?;

        let mut table = self.filters.apply(data_type, raw);
        let dropped = table.drop_nulls(&spec.mandatory_columns());
        if dropped > 0 {
            tracing::debug!(
                patient_id = %patient_id,
                data_type = %data_type,
                dropped,
                "Dropped rows with missing mandatory values"
            );
        }

        if self.dry_run {
            tracing::info!(
                patient_id = %patient_id,
                data_type = %data_type,
                rows = table.len(),
                "Dry run, batch not cached"
            );
        } else {
            self.storage.write_table(&path, &table)?;
        }

        log_batch_fetched!(patient_id, data_type, table.len(), false);
        Ok(table)
    }
}
