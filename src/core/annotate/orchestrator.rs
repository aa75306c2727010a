//! Annotation orchestrator
//!
//! Turns a patient's raw document batch into an annotation table, one row per
//! recognised entity, and persists it. A `(patient, source)` pair moves from
//! [`AnnotationState::Unannotated`] through [`AnnotationState::Annotating`] to
//! [`AnnotationState::Persisted`]; there is no failed state. A persisted file is
//! never recomputed, which is what makes reruns incremental.

use crate::adapters::annotator::ConceptAnnotator;
use crate::adapters::storage::Storage;
use crate::config::AnnotationConfig;
use crate::domain::{
    AnnotationError, AnnotationRow, AnnotationSource, PatientId, Result, SextantError, Table,
    PATIENT_ID_COLUMN,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Characters of context kept either side of an entity span
pub const CONTEXT_CHARS: usize = 300;

/// Annotation file for one patient and source, relative to the storage root
pub fn annotation_path(patient_id: &PatientId, source: AnnotationSource) -> PathBuf {
    PathBuf::from(source.annotation_dir()).join(format!("{}.csv", patient_id.as_str()))
}

/// Text around `[start, end)` widened by [`CONTEXT_CHARS`] and clamped to the document
///
/// Offsets count characters, not bytes.
pub fn context_window(
    text: &str,
    start: usize,
    end: usize,
) -> std::result::Result<String, AnnotationError> {
    let len = text.chars().count();
    if start > end || end > len {
        return Err(AnnotationError::SpanOutOfBounds { start, end, len });
    }
    let lo = start.saturating_sub(CONTEXT_CHARS);
    let hi = (end + CONTEXT_CHARS).min(len);
    Ok(text.chars().skip(lo).take(hi - lo).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationState {
    Unannotated,
    Annotating,
    Persisted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationOutcome {
    /// A file already existed; nothing was recomputed
    AlreadyPersisted,
    /// Freshly annotated and written
    Persisted(Table),
}

struct CodeMapping {
    table: Table,
    key: String,
}

/// Drives the concept-recognition engine and persists its output
pub struct AnnotationOrchestrator {
    storage: Arc<dyn Storage>,
    annotator: Arc<dyn ConceptAnnotator>,
    code_mapping: Option<CodeMapping>,
    dry_run: bool,
    in_flight: Mutex<HashSet<(PatientId, AnnotationSource)>>,
}

impl AnnotationOrchestrator {
    /// # Errors
    ///
    /// Returns an error if a configured code mapping table cannot be read or
    /// lacks its key column.
    pub fn new(
        storage: Arc<dyn Storage>,
        annotator: Arc<dyn ConceptAnnotator>,
        config: &AnnotationConfig,
        dry_run: bool,
    ) -> Result<Self> {
        let code_mapping = match config.code_mapping_path {
            Some(ref path) => {
                let table = storage.read_table(Path::new(path))?;
                if !table.has_column(&config.code_mapping_key) {
                    return Err(SextantError::Configuration(format!(
                        "code mapping {path} has no '{}' column",
                        config.code_mapping_key
                    )));
                }
                tracing::info!(path = %path, rows = table.len(), "Loaded code mapping");
                Some(CodeMapping {
                    table,
                    key: config.code_mapping_key.clone(),
                })
            }
            None => None,
        };

        Ok(Self {
            storage,
            annotator,
            code_mapping,
            dry_run,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    pub fn state(&self, patient_id: &PatientId, source: AnnotationSource) -> Result<AnnotationState> {
        let key = (patient_id.clone(), source);
        if self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&key)
        {
            return Ok(AnnotationState::Annotating);
        }
        if self.storage.exists(&annotation_path(patient_id, source))? {
            Ok(AnnotationState::Persisted)
        } else {
            Ok(AnnotationState::Unannotated)
        }
    }

    /// Annotate `raw_batch` unless this pair was annotated before
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails as a whole or the result
    /// cannot be written. Failures confined to one document or one entity are
    /// logged and skipped.
    pub async fn annotate_batch(
        &self,
        patient_id: &PatientId,
        source: AnnotationSource,
        raw_batch: &Table,
    ) -> Result<AnnotationOutcome> {
        if self.state(patient_id, source)? == AnnotationState::Persisted {
            tracing::debug!(
                patient_id = %patient_id,
                source = %source,
                "Annotations already persisted"
            );
            return Ok(AnnotationOutcome::AlreadyPersisted);
        }

        let key = (patient_id.clone(), source);
        self.set_in_flight(&key, true);
        let result = self.annotate_and_persist(patient_id, source, raw_batch).await;
        self.set_in_flight(&key, false);

        result.map(AnnotationOutcome::Persisted)
    }

    fn set_in_flight(&self, key: &(PatientId, AnnotationSource), on: bool) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if on {
            in_flight.insert(key.clone());
        } else {
            in_flight.remove(key);
        }
    }

    async fn annotate_and_persist(
        &self,
        patient_id: &PatientId,
        source: AnnotationSource,
        raw_batch: &Table,
    ) -> Result<Table> {
        let text_column = source.text_column();
        let ts_column = source.timestamp_column();
        let doc_column = source.document_id_column();

        let documents: Vec<_> = raw_batch
            .iter()
            .filter(|row| row.get(text_column).is_some())
            .collect();
        let texts: Vec<String> = documents
            .iter()
            .filter_map(|row| row.get(text_column).map(String::from))
            .collect();

        let results = self.annotator.annotate_many(&texts).await?;

        let mut table = Table::new(source.annotation_columns());
        for ((row, text), result) in documents.iter().zip(&texts).zip(results) {
            let entities = match result {
                Ok(entities) => entities,
                Err(e) => {
                    tracing::warn!(
                        patient_id = %patient_id,
                        source = %source,
                        document_id = row.get(doc_column).unwrap_or_default(),
                        error = %e,
                        "Document annotation failed, skipped"
                    );
                    continue;
                }
            };

            for entity in entities.into_values() {
                let text_sample = match context_window(text, entity.start, entity.end) {
                    Ok(sample) => sample,
                    Err(e) => {
                        tracing::warn!(
                            patient_id = %patient_id,
                            cui = %entity.cui,
                            error = %e,
                            "Entity span outside document, skipped"
                        );
                        continue;
                    }
                };
                let annotation = AnnotationRow {
                    patient_id: row.get(PATIENT_ID_COLUMN).map(String::from),
                    timestamp: row.get(ts_column).map(String::from),
                    entity,
                    text_sample,
                    document_id: row.get(doc_column).map(String::from),
                };
                table.push_row(annotation.into_cells())?;
            }
        }

        let dropped = table.drop_nulls(&[PATIENT_ID_COLUMN, ts_column]);
        if dropped > 0 {
            tracing::debug!(
                patient_id = %patient_id,
                source = %source,
                dropped,
                "Dropped annotations without patient id or timestamp"
            );
        }

        if let Some(ref mapping) = self.code_mapping {
            table = table.left_join(&mapping.table, &mapping.key)?;
        }

        if self.dry_run {
            tracing::info!(
                patient_id = %patient_id,
                source = %source,
                rows = table.len(),
                "Dry run, annotations not persisted"
            );
        } else {
            self.storage
                .write_table(&annotation_path(patient_id, source), &table)?;
        }

        tracing::info!(
            patient_id = %patient_id,
            source = %source,
            documents = texts.len(),
            annotations = table.len(),
            "Annotated batch"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::annotator::DocumentAnnotations;
    use crate::adapters::storage::LocalStorage;
    use crate::domain::{Entity, EntitySet};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use test_case::test_case;

    /// Finds every occurrence of "pain" and fails any text containing "FAIL"
    struct KeywordAnnotator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConceptAnnotator for KeywordAnnotator {
        async fn annotate_many(&self, texts: &[String]) -> Result<Vec<DocumentAnnotations>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|text| {
                    if text.contains("FAIL") {
                        return Err(AnnotationError::InvalidResponse("engine".to_string()));
                    }
                    let mut set = EntitySet::new();
                    for (i, (start, _)) in text.match_indices("pain").enumerate() {
                        set.insert(
                            i.to_string(),
                            Entity {
                                cui: "C0030193".to_string(),
                                pretty_name: "Pain".to_string(),
                                start,
                                end: start + 4,
                                acc: 0.9,
                                ..Entity::default()
                            },
                        );
                    }
                    Ok(set)
                })
                .collect())
        }
    }

    fn epr_batch(rows: &[(Option<&str>, Option<&str>, Option<&str>)]) -> Table {
        let mut table = Table::new(["client_idcode", "document_guid", "body_analysed", "updatetime"]);
        for (i, (id, text, ts)) in rows.iter().enumerate() {
            table
                .push_row(vec![
                    id.map(String::from),
                    Some(format!("D{i}")),
                    text.map(String::from),
                    ts.map(String::from),
                ])
                .unwrap();
        }
        table
    }

    fn orchestrator(dir: &TempDir, config: &AnnotationConfig) -> (AnnotationOrchestrator, Arc<KeywordAnnotator>) {
        let annotator = Arc::new(KeywordAnnotator {
            calls: AtomicUsize::new(0),
        });
        let orch = AnnotationOrchestrator::new(
            Arc::new(LocalStorage::new(dir.path())),
            annotator.clone(),
            config,
            false,
        )
        .unwrap();
        (orch, annotator)
    }

    fn patient() -> PatientId {
        PatientId::new("P1").unwrap()
    }

    #[test_case(24, 10, 14, 24; "short text fully kept")]
    #[test_case(404, 400, 404, 304; "left side clamped to context")]
    #[test_case(1000, 400, 404, 604; "both sides clamped to context")]
    fn test_context_window(len: usize, start: usize, end: usize, expected: usize) {
        let text = "x".repeat(len);
        let sample = context_window(&text, start, end).unwrap();
        assert_eq!(sample.chars().count(), expected);
    }

    #[test]
    fn test_context_window_counts_chars() {
        let text = "ééé pain ééé";
        assert_eq!(context_window(text, 4, 8).unwrap(), text);
    }

    #[test]
    fn test_context_window_rejects_bad_span() {
        assert!(matches!(
            context_window("short", 2, 10),
            Err(AnnotationError::SpanOutOfBounds { len: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_rows_are_valid_and_persisted() {
        let dir = TempDir::new().unwrap();
        let (orch, _) = orchestrator(&dir, &AnnotationConfig::default());
        let batch = epr_batch(&[
            (Some("P1"), Some("chest pain and back pain"), Some("2021-01-01T00:00:00")),
            (Some("P1"), None, Some("2021-01-02T00:00:00")),
            (Some("P1"), Some("pain"), None),
            (Some("P1"), Some("FAIL pain"), Some("2021-01-03T00:00:00")),
        ]);

        let outcome = orch
            .annotate_batch(&patient(), AnnotationSource::Epr, &batch)
            .await
            .unwrap();
        let AnnotationOutcome::Persisted(table) = outcome else {
            panic!("expected fresh annotations");
        };

        assert_eq!(table.len(), 2);
        for row in table.iter() {
            assert!(row.get("client_idcode").is_some());
            assert!(row.get("updatetime").is_some());
            assert_eq!(row.get("document_guid"), Some("D0"));
        }
        assert_eq!(
            orch.state(&patient(), AnnotationSource::Epr).unwrap(),
            AnnotationState::Persisted
        );
    }

    #[tokio::test]
    async fn test_existing_file_is_not_recomputed() {
        let dir = TempDir::new().unwrap();
        let (orch, annotator) = orchestrator(&dir, &AnnotationConfig::default());
        let batch = epr_batch(&[(Some("P1"), Some("pain"), Some("2021-01-01"))]);

        orch.annotate_batch(&patient(), AnnotationSource::Epr, &batch).await.unwrap();
        let second = orch
            .annotate_batch(&patient(), AnnotationSource::Epr, &batch)
            .await
            .unwrap();

        assert_eq!(second, AnnotationOutcome::AlreadyPersisted);
        assert_eq!(annotator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_result_still_writes_schema() {
        let dir = TempDir::new().unwrap();
        let (orch, _) = orchestrator(&dir, &AnnotationConfig::default());
        let batch = epr_batch(&[(Some("P1"), Some("nothing relevant"), Some("2021-01-01"))]);

        orch.annotate_batch(&patient(), AnnotationSource::Epr, &batch).await.unwrap();

        let written = std::fs::read_to_string(
            dir.path().join("current_pat_documents_annotations_epr/P1.csv"),
        )
        .unwrap();
        let header = written.lines().next().unwrap();
        assert!(header.starts_with("client_idcode,updatetime,cui"));
    }

    #[tokio::test]
    async fn test_code_mapping_join_adds_columns() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("mapping.csv"),
            "cui,snomed\nC0030193,22253000\nC0030193,102498003\n",
        )
        .unwrap();
        let config = AnnotationConfig {
            code_mapping_path: Some("mapping.csv".to_string()),
            ..AnnotationConfig::default()
        };
        let (orch, _) = orchestrator(&dir, &config);
        let batch = epr_batch(&[(Some("P1"), Some("pain"), Some("2021-01-01"))]);

        let AnnotationOutcome::Persisted(table) = orch
            .annotate_batch(&patient(), AnnotationSource::Epr, &batch)
            .await
            .unwrap()
        else {
            panic!("expected fresh annotations");
        };
        assert_eq!(table.len(), 2, "one-to-many mapping duplicates the row");
        assert!(table.has_column("snomed"));
    }

    #[tokio::test]
    async fn test_unannotated_before_first_run() {
        let dir = TempDir::new().unwrap();
        let (orch, _) = orchestrator(&dir, &AnnotationConfig::default());
        assert_eq!(
            orch.state(&patient(), AnnotationSource::Mct).unwrap(),
            AnnotationState::Unannotated
        );
    }
}
