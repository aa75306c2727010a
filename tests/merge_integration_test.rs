//! Integration tests for the heterogeneous-schema merge

use sextant::adapters::storage::LocalStorage;
use sextant::config::MergeConfig;
use sextant::core::merge::MergeEngine;
use sextant::domain::SextantError;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn write_vector(dir: &TempDir, name: &str, body: &str) {
    let path = dir.path().join("output_vectors").join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn merge_config(dir: &TempDir) -> MergeConfig {
    MergeConfig {
        input_dir: "output_vectors".to_string(),
        output_path: dir.path().join("merged.csv").to_string_lossy().into_owned(),
        ..MergeConfig::default()
    }
}

fn merge(dir: &TempDir, config: MergeConfig) -> sextant::domain::Result<sextant::core::merge::MergeReport> {
    MergeEngine::new(Arc::new(LocalStorage::new(dir.path())), config)?.merge_all()
}

#[test]
fn test_union_of_columns_is_sorted_and_padded() {
    let dir = TempDir::new().unwrap();
    write_vector(&dir, "P1.csv", "id,name\n1,alice\n");
    write_vector(&dir, "P2.csv", "id,age\n2,54\n");

    let report = merge(&dir, merge_config(&dir)).unwrap();

    assert_eq!(report.columns, vec!["age", "id", "name"]);
    assert_eq!(report.rows_written, 2);
    let out = fs::read_to_string(&report.output_path).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "age,id,name");
    assert!(lines.contains(&",1,alice"));
    assert!(lines.contains(&"54,2,"));
}

#[test]
fn test_sample_limits_files() {
    let dir = TempDir::new().unwrap();
    for i in 0..3 {
        write_vector(&dir, &format!("P{i}.csv"), &format!("id\n{i}\n"));
    }
    let config = MergeConfig {
        sample_size: Some(2),
        ..merge_config(&dir)
    };

    let report = merge(&dir, config).unwrap();
    assert_eq!(report.files_found, 3);
    assert_eq!(report.files_merged, 2);
    assert_eq!(report.rows_written, 2);
}

#[test]
fn test_missing_input_directory() {
    let dir = TempDir::new().unwrap();
    let err = merge(&dir, merge_config(&dir)).unwrap_err();
    assert!(matches!(err, SextantError::NoInputFiles(_)));
}

#[test]
fn test_date_buckets_are_folded_after_merge() {
    let dir = TempDir::new().unwrap();
    write_vector(&dir, "P1.csv", "id,date_bucket_2020_01,date_bucket_2020_02\n1,0,1\n");
    write_vector(&dir, "P2.csv", "id,date_bucket_2020_01\n2,1\n");
    let config = MergeConfig {
        decode_date_buckets: true,
        ..merge_config(&dir)
    };

    let report = merge(&dir, config).unwrap();
    assert!(report.columns.contains(&"timestamp".to_string()));
    assert!(!report.columns.iter().any(|c| c.starts_with("date_bucket_")));

    let out = fs::read_to_string(&report.output_path).unwrap();
    assert!(out.contains("2020-02-01"));
    assert!(out.contains("2020-01-01"));
}
