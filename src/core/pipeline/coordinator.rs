//! Pipeline coordinator - the per-patient run loop
//!
//! For every patient in the cohort, in order: pick the time window, fetch each
//! configured data type through the batch cache, annotate the document
//! sources, and account for the sub-windows. Patients are processed one at a
//! time and every collaborator call is awaited before the next starts.

use super::context::RunContext;
use super::summary::RunSummary;
use crate::adapters::annotator::{AnnotatorClient, ConceptAnnotator};
use crate::adapters::search::{CohortSearch, SearchClient};
use crate::adapters::storage::{create_storage, Storage};
use crate::config::{CohortConfig, SextantConfig};
use crate::core::annotate::{AnnotationOrchestrator, AnnotationOutcome};
use crate::core::cache::BatchCacheManager;
use crate::core::window::{generate_sub_windows, parse_datetime, slice_window, WindowPlan};
use crate::domain::context::ResultExt;
use crate::domain::{DataType, DateParts, PatientId, Result, SextantError, Table};
use crate::{log_patient_skip, log_progress};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// One patient to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortMember {
    pub patient_id: PatientId,
    /// Patient-specific start date that may widen the global window
    pub start_date: Option<DateParts>,
}

/// Patients to process, in order, without duplicates
///
/// Explicit ids win, then the cohort list file, then the patients of the
/// individual-window table.
///
/// # Errors
///
/// Returns a configuration error when no cohort source is configured or the
/// list file lacks its id column.
pub fn load_cohort(
    cohort: &CohortConfig,
    storage: &dyn Storage,
    windows: &WindowPlan,
) -> Result<Vec<CohortMember>> {
    let mut seen = HashSet::new();
    let mut members = Vec::new();
    let mut push = |member: CohortMember| {
        if seen.insert(member.patient_id.clone()) {
            members.push(member);
        }
    };

    if !cohort.patient_ids.is_empty() {
        for raw in &cohort.patient_ids {
            let patient_id = PatientId::new(raw.as_str()).map_err(SextantError::Validation)?;
            push(CohortMember {
                patient_id,
                start_date: None,
            });
        }
    } else if let Some(ref path) = cohort.patient_list_path {
        let table = storage
            .read_table(Path::new(path))
            .with_context(|| format!("Failed to read cohort list {path}"))?;
        if !table.has_column(&cohort.id_column) {
            return Err(SextantError::Configuration(format!(
                "cohort list {path} has no '{}' column",
                cohort.id_column
            )));
        }
        for row in table.iter() {
            let Some(patient_id) = row.get(&cohort.id_column).and_then(|id| PatientId::new(id).ok())
            else {
                tracing::warn!(row = row.index(), "Cohort row without a usable id skipped");
                continue;
            };
            let start_date = cohort
                .start_date_column
                .as_deref()
                .and_then(|column| row.get(column))
                .and_then(parse_datetime)
                .map(|dt| DateParts::from_datetime(&dt));
            push(CohortMember {
                patient_id,
                start_date,
            });
        }
    } else if windows.has_individual() {
        for patient_id in windows.individual_patients() {
            push(CohortMember {
                patient_id: patient_id.clone(),
                start_date: None,
            });
        }
    } else {
        return Err(SextantError::Configuration(
            "no cohort configured: set cohort.patient_ids, cohort.patient_list_path or window.individual"
                .to_string(),
        ));
    }

    Ok(members)
}

/// Pipeline coordinator
pub struct PipelineCoordinator {
    config: SextantConfig,
    storage: Arc<dyn Storage>,
    cache: BatchCacheManager,
    annotator: Option<AnnotationOrchestrator>,
    windows: WindowPlan,
    context: Arc<RunContext>,
    shutdown: watch::Receiver<bool>,
}

impl PipelineCoordinator {
    /// Build a coordinator with the production storage, search and annotation clients
    ///
    /// # Errors
    ///
    /// Returns an error if a backend cannot be constructed or the window plan
    /// cannot be computed.
    pub fn from_config(config: SextantConfig, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let storage = create_storage(&config.storage)?;
        let search: Arc<dyn CohortSearch> = Arc::new(SearchClient::new(&config.search)?);
        let annotator: Option<Arc<dyn ConceptAnnotator>> = if config.annotation.enabled {
            Some(Arc::new(AnnotatorClient::new(&config.annotation)?))
        } else {
            None
        };
        Self::new(config, storage, search, annotator, shutdown)
    }

    /// Build a coordinator from explicit collaborators
    ///
    /// # Errors
    ///
    /// Returns an error if the window plan, post-filters or code mapping
    /// cannot be set up.
    pub fn new(
        config: SextantConfig,
        storage: Arc<dyn Storage>,
        search: Arc<dyn CohortSearch>,
        annotator: Option<Arc<dyn ConceptAnnotator>>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let context = Arc::new(RunContext::new());
        let dry_run = config.application.dry_run;

        let cache = BatchCacheManager::new(
            Arc::clone(&storage),
            search,
            &config.batch,
            dry_run,
            Arc::clone(&context),
        )?;
        let annotator = match annotator {
            Some(engine) => Some(AnnotationOrchestrator::new(
                Arc::clone(&storage),
                engine,
                &config.annotation,
                dry_run,
            )?),
            None => None,
        };
        let windows = WindowPlan::from_config(&config.window, storage.as_ref())?;

        tracing::info!(
            storage = %storage.describe(),
            global_window = %windows.global(),
            lookback = windows.lookback(),
            individual_windows = windows.has_individual(),
            data_types = config.batch.data_types.len(),
            annotation = annotator.is_some(),
            dry_run,
            "Pipeline initialised"
        );

        Ok(Self {
            config,
            storage,
            cache,
            annotator,
            windows,
            context,
            shutdown,
        })
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.context
    }

    pub fn windows(&self) -> &WindowPlan {
        &self.windows
    }

    /// Patients to process, see [`load_cohort`]
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no cohort source is configured.
    pub fn load_cohort(&self) -> Result<Vec<CohortMember>> {
        load_cohort(&self.config.cohort, self.storage.as_ref(), &self.windows)
    }

    /// Run the whole cohort
    ///
    /// Stops between patients once the shutdown signal is set.
    ///
    /// # Errors
    ///
    /// Returns an error only when the cohort itself cannot be loaded; patient
    /// failures are recorded in the summary.
    pub async fn execute(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::new();

        let cohort = self.load_cohort()?;
        summary.total_patients = cohort.len();
        tracing::info!(patients = cohort.len(), "Starting cohort run");

        for (i, member) in cohort.iter().enumerate() {
            if *self.shutdown.borrow() {
                tracing::warn!(
                    remaining = cohort.len() - i,
                    "Shutdown requested, stopping before next patient"
                );
                summary.interrupted = true;
                break;
            }

            let window = self
                .windows
                .for_patient(&member.patient_id, member.start_date);
            if let Err(e) = self.process_patient(member, &mut summary).await {
                tracing::error!(
                    patient_id = %member.patient_id,
                    window = %window,
                    error = %e,
                    "Patient failed"
                );
                summary.failed_patients += 1;
                self.context
                    .record_skip(member.patient_id.as_str(), "patient", Some(window), e.to_string());
            }

            if (i + 1) % 50 == 0 || i + 1 == cohort.len() {
                log_progress!(i + 1, cohort.len(), self.context.skipped());
            }
        }

        summary.processed_patients = self.context.processed();
        summary.skipped_steps = self.context.skipped().saturating_sub(summary.failed_patients);
        summary.failures = self.context.failures();
        let summary = summary.with_duration(started.elapsed());
        summary.log_summary();
        Ok(summary)
    }

    async fn process_patient(&self, member: &CohortMember, summary: &mut RunSummary) -> Result<()> {
        let patient_id = &member.patient_id;
        let window = self.windows.for_patient(patient_id, member.start_date);
        tracing::debug!(patient_id = %patient_id, window = %window, "Processing patient");

        let mut batches: BTreeMap<DataType, Table> = BTreeMap::new();
        let mut degraded: BTreeSet<DataType> = BTreeSet::new();
        for &data_type in &self.config.batch.data_types {
            let batch = self.cache.fetch_batch(patient_id, data_type, &window).await?;
            summary.batches += 1;
            if batch.degraded {
                degraded.insert(data_type);
            }
            batches.insert(data_type, batch.table);
        }

        if let Some(interval) = self.windows.interval() {
            let subs: Vec<_> = generate_sub_windows(window, interval, self.windows.lookback()).collect();
            let last = subs.len().saturating_sub(1);
            for (i, sub) in subs.iter().enumerate() {
                for (data_type, batch) in &batches {
                    let rows = slice_window(batch, data_type.spec().timestamp_column, sub, i == last);
                    summary.rows_in_sub_windows += rows.len();
                }
            }
            summary.sub_windows += subs.len();
        }

        if let Some(ref orchestrator) = self.annotator {
            for &source in &self.config.annotation.sources {
                let Some(batch) = batches.get(&source.data_type()) else {
                    continue;
                };
                // Annotating the stand-in would persist an empty file and block a retry
                if degraded.contains(&source.data_type()) {
                    tracing::debug!(
                        patient_id = %patient_id,
                        source = %source,
                        "Annotation deferred after failed retrieval"
                    );
                    continue;
                }
                match orchestrator.annotate_batch(patient_id, source, batch).await {
                    Ok(AnnotationOutcome::Persisted(_)) => summary.annotations_persisted += 1,
                    Ok(AnnotationOutcome::AlreadyPersisted) => summary.annotations_reused += 1,
                    Err(e) => {
                        log_patient_skip!(patient_id, source, e);
                        self.context.record_skip(
                            patient_id.as_str(),
                            source.name(),
                            Some(window),
                            e.to_string(),
                        );
                    }
                }
            }
        }

        self.context.record_processed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::annotator::DocumentAnnotations;
    use crate::adapters::search::SearchRequest;
    use crate::adapters::storage::LocalStorage;
    use crate::config::parse_config;
    use crate::core::window::compute_global_window;
    use crate::domain::{Entity, EntitySet, SearchError};
    use async_trait::async_trait;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[window]
start_year = 2020
start_month = 1
start_day = 1
end_year = 2021
end_month = 1
end_day = 1
interval = "6m"

[cohort]
patient_ids = ["P1", "P2", "P1"]

[search]
base_url = "http://localhost:9200"
"#;

    /// Serves two EPR notes per patient and fails for "P2"
    struct FakeSearch;

    #[async_trait]
    impl CohortSearch for FakeSearch {
        async fn search(&self, request: &SearchRequest) -> Result<Table> {
            if request.id_values.contains(&"P2".to_string()) {
                return Err(SearchError::ConnectionFailed("down".to_string()).into());
            }
            let mut table = Table::new(request.fields.iter().cloned());
            for (text, ts) in [("chest pain", "2020-02-01T10:00:00"), ("follow up", "2020-09-01T10:00:00")] {
                let mut record = BTreeMap::new();
                record.insert("client_idcode".to_string(), Some(request.id_values[0].clone()));
                record.insert("document_guid".to_string(), Some(format!("doc-{ts}")));
                record.insert("body_analysed".to_string(), Some(text.to_string()));
                record.insert("updatetime".to_string(), Some(ts.to_string()));
                table.push_record(&record);
            }
            Ok(table)
        }
    }

    struct FakeAnnotator;

    #[async_trait]
    impl ConceptAnnotator for FakeAnnotator {
        async fn annotate_many(&self, texts: &[String]) -> Result<Vec<DocumentAnnotations>> {
            Ok(texts
                .iter()
                .map(|_| {
                    let mut set = EntitySet::new();
                    set.insert(
                        "1".to_string(),
                        Entity {
                            cui: "C1".to_string(),
                            start: 0,
                            end: 5,
                            ..Entity::default()
                        },
                    );
                    Ok(set)
                })
                .collect())
        }
    }

    fn coordinator(dir: &TempDir, shutdown: watch::Receiver<bool>) -> PipelineCoordinator {
        let config = parse_config(CONFIG).unwrap();
        PipelineCoordinator::new(
            config,
            Arc::new(LocalStorage::new(dir.path())),
            Arc::new(FakeSearch),
            Some(Arc::new(FakeAnnotator)),
            shutdown,
        )
        .unwrap()
    }

    fn global_plan() -> WindowPlan {
        let config = parse_config(CONFIG).unwrap();
        WindowPlan::new(compute_global_window(&config.window).unwrap(), false)
    }

    #[test]
    fn test_cohort_is_deduplicated() {
        let dir = TempDir::new().unwrap();
        let (_tx, rx) = watch::channel(false);
        let cohort = coordinator(&dir, rx).load_cohort().unwrap();
        let ids: Vec<&str> = cohort.iter().map(|m| m.patient_id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P2"]);
    }

    #[test]
    fn test_cohort_from_list_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("cohort.csv"),
            "client_idcode,first_seen\nP9,2020-03-15\n,2020-01-01\nP8,\n",
        )
        .unwrap();
        let storage = LocalStorage::new(dir.path());
        let cohort_config = CohortConfig {
            patient_list_path: Some("cohort.csv".to_string()),
            start_date_column: Some("first_seen".to_string()),
            ..CohortConfig::default()
        };
        let windows = global_plan();

        let cohort = load_cohort(&cohort_config, &storage, &windows).unwrap();
        assert_eq!(cohort.len(), 2);
        assert_eq!(cohort[0].patient_id.as_str(), "P9");
        assert_eq!(cohort[0].start_date, Some(DateParts::new(2020, 3, 15)));
        assert_eq!(cohort[1].start_date, None);
    }

    #[test]
    fn test_cohort_requires_a_source() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let windows = global_plan();
        let err = load_cohort(&CohortConfig::default(), &storage, &windows).unwrap_err();
        assert!(matches!(err, SextantError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_run_continues_past_failed_patient() {
        let dir = TempDir::new().unwrap();
        let (_tx, rx) = watch::channel(false);
        let summary = coordinator(&dir, rx).execute().await.unwrap();

        assert_eq!(summary.total_patients, 2);
        assert_eq!(summary.processed_patients, 1);
        assert_eq!(summary.failed_patients, 1);
        assert_eq!(summary.annotations_persisted, 1);
        assert_eq!(summary.sub_windows, 2);
        assert_eq!(summary.rows_in_sub_windows, 2);
        assert_eq!(summary.failures[0].patient_id, "P2");
        assert!(dir
            .path()
            .join("current_pat_documents_annotations_epr/P1.csv")
            .exists());
    }

    #[tokio::test]
    async fn test_rerun_reuses_annotations() {
        let dir = TempDir::new().unwrap();
        let (_tx, rx) = watch::channel(false);
        coordinator(&dir, rx.clone()).execute().await.unwrap();
        let second = coordinator(&dir, rx).execute().await.unwrap();
        assert_eq!(second.annotations_reused, 1);
        assert_eq!(second.annotations_persisted, 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_first_patient() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = watch::channel(false);
        let coordinator = coordinator(&dir, rx);
        tx.send(true).unwrap();

        let summary = coordinator.execute().await.unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.processed_patients, 0);
        assert!(!summary.is_successful());
    }
}
