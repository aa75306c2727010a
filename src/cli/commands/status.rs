//! Status command implementation
//!
//! This module implements the `status` command: how many patients have a
//! cached batch per data type and a persisted annotation file per source.

use crate::adapters::storage::{create_storage, Storage};
use crate::config::load_config;
use crate::domain::{AnnotationSource, DataType, Result, SextantError, StorageError};
use clap::Args;
use std::path::Path;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this data type or annotation source
    #[arg(long)]
    pub only: Option<String>,
}

/// Number of `*.csv` files directly under `dir`, zero if it does not exist
fn count_csv_files(storage: &dyn Storage, dir: &str) -> Result<usize> {
    match storage.list_dir(Path::new(dir)) {
        Ok(names) => Ok(names.iter().filter(|n| n.ends_with(".csv")).count()),
        Err(SextantError::Storage(StorageError::NotFound(_))) => Ok(0),
        Err(e) => Err(e),
    }
}

/// Rows of the status table as (kind, name, directory, files)
fn collect_status(
    storage: &dyn Storage,
    only: Option<&str>,
) -> Result<Vec<(&'static str, &'static str, &'static str, usize)>> {
    let mut rows = Vec::new();
    for data_type in DataType::ALL {
        if only.is_some_and(|o| o != data_type.name()) {
            continue;
        }
        let dir = data_type.spec().cache_dir;
        rows.push(("batch", data_type.name(), dir, count_csv_files(storage, dir)?));
    }
    for source in AnnotationSource::ALL {
        if only.is_some_and(|o| o != source.name()) {
            continue;
        }
        let dir = source.annotation_dir();
        rows.push(("annotation", source.name(), dir, count_csv_files(storage, dir)?));
    }
    Ok(rows)
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking cache status");

        println!("📊 Cache Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let storage = match create_storage(&config.storage) {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to open storage");
                println!("   Error: {e}");
                return Ok(4);
            }
        };

        let rows = match collect_status(storage.as_ref(), self.only.as_deref()) {
            Ok(rows) => rows,
            Err(e) => {
                println!("❌ Failed to list cache directories");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        if rows.is_empty() {
            println!("No data type or annotation source matches the filter.");
            return Ok(0);
        }

        println!("Storage: {}", storage.describe());
        println!();
        println!("{:<12} {:<16} {:<42} {:>8}", "Kind", "Name", "Directory", "Patients");
        println!("{}", "-".repeat(81));
        for (kind, name, dir, count) in rows {
            println!("{kind:<12} {name:<16} {dir:<42} {count:>8}");
        }
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use tempfile::TempDir;

    #[test]
    fn test_status_counts_csv_files() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("current_pat_documents_epr");
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join("P1.csv"), "a\n").unwrap();
        std::fs::write(cache.join("P2.csv"), "a\n").unwrap();
        std::fs::write(cache.join("P2.csv.tmp"), "a\n").unwrap();
        let storage = LocalStorage::new(dir.path());

        let rows = collect_status(&storage, None).unwrap();
        assert_eq!(rows.len(), DataType::ALL.len() + AnnotationSource::ALL.len());
        let epr = rows.iter().find(|r| r.1 == "epr_documents").unwrap();
        assert_eq!(epr.3, 2);
        assert!(rows.iter().filter(|r| r.1 != "epr_documents").all(|r| r.3 == 0));
    }

    #[test]
    fn test_status_filter() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let rows = collect_status(&storage, Some("mct")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "annotation");
    }
}
