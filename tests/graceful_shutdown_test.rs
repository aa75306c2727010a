//! Integration tests for graceful shutdown
//!
//! The shutdown flag is checked between patients: the patient in progress
//! finishes, and the remaining ones are left for the next run.

use async_trait::async_trait;
use sextant::adapters::search::{CohortSearch, SearchRequest};
use sextant::adapters::storage::LocalStorage;
use sextant::config::parse_config;
use sextant::core::pipeline::PipelineCoordinator;
use sextant::domain::{Result, Table};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

const CONFIG: &str = r#"
[window]
start_year = 2020
start_month = 1
start_day = 1
end_year = 2021
end_month = 1
end_day = 1

[cohort]
patient_ids = ["P1", "P2", "P3"]

[search]
base_url = "http://localhost:9200"

[annotation]
enabled = false
"#;

/// Raises the shutdown flag during its first search, like a Ctrl+C mid-patient
struct InterruptingSearch {
    shutdown: watch::Sender<bool>,
}

#[async_trait]
impl CohortSearch for InterruptingSearch {
    async fn search(&self, request: &SearchRequest) -> Result<Table> {
        let _ = self.shutdown.send(true);
        let mut table = Table::new(request.fields.iter().cloned());
        let mut record = BTreeMap::new();
        record.insert("client_idcode".to_string(), Some(request.id_values[0].clone()));
        record.insert("document_guid".to_string(), Some("doc-1".to_string()));
        record.insert("body_analysed".to_string(), Some("note".to_string()));
        record.insert("updatetime".to_string(), Some("2020-05-01T12:00:00".to_string()));
        table.push_record(&record);
        Ok(table)
    }
}

fn coordinator(dir: &TempDir, tx: watch::Sender<bool>, rx: watch::Receiver<bool>) -> PipelineCoordinator {
    PipelineCoordinator::new(
        parse_config(CONFIG).unwrap(),
        Arc::new(LocalStorage::new(dir.path())),
        Arc::new(InterruptingSearch { shutdown: tx }),
        None,
        rx,
    )
    .unwrap()
}

#[tokio::test]
async fn test_shutdown_signal_propagation() {
    let (shutdown_tx, shutdown_rx1) = watch::channel(false);
    let shutdown_rx2 = shutdown_rx1.clone();

    assert!(!*shutdown_rx1.borrow());
    shutdown_tx.send(true).unwrap();
    assert!(*shutdown_rx1.borrow());
    assert!(*shutdown_rx2.borrow());
}

#[tokio::test]
async fn test_current_patient_finishes_then_run_stops() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = watch::channel(false);

    let summary = coordinator(&dir, tx, rx).execute().await.unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.total_patients, 3);
    assert_eq!(summary.processed_patients, 1);
    assert_eq!(summary.failed_patients, 0);
    assert!(dir.path().join("current_pat_documents_epr/P1.csv").exists());
    assert!(!dir.path().join("current_pat_documents_epr/P2.csv").exists());
}

#[tokio::test]
async fn test_interrupted_run_resumes_from_cache() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = watch::channel(false);
    coordinator(&dir, tx, rx).execute().await.unwrap();

    // Second run with a fresh signal: P1 comes from the cache, P2 trips the flag again
    let (tx, rx) = watch::channel(false);
    let summary = coordinator(&dir, tx, rx).execute().await.unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.processed_patients, 2);
    assert!(dir.path().join("current_pat_documents_epr/P2.csv").exists());
    assert!(!dir.path().join("current_pat_documents_epr/P3.csv").exists());
}
