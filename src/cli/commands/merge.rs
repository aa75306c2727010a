//! Merge command implementation
//!
//! Consolidates the CSV files under `merge.input_dir` into one file whose
//! header is the union of every input header.

use crate::adapters::storage::create_storage;
use crate::config::load_config;
use crate::core::merge::MergeEngine;
use crate::domain::SextantError;
use clap::Args;

/// Arguments for the merge command
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Override the directory scanned for CSV files
    #[arg(short, long)]
    pub input_dir: Option<String>,

    /// Override the output file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Merge a random sample of this many files
    #[arg(long)]
    pub sample_size: Option<usize>,

    /// Read chunks on a worker pool
    #[arg(long)]
    pub parallel: bool,

    /// Worker pool size when running in parallel
    #[arg(long)]
    pub workers: Option<usize>,

    /// Fold date_bucket_* columns into a single timestamp column
    #[arg(long)]
    pub decode_date_buckets: bool,
}

impl MergeArgs {
    /// Execute the merge command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting merge command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        let mut merge = config.merge.clone();
        if let Some(ref dir) = self.input_dir {
            merge.input_dir = dir.clone();
        }
        if let Some(ref output) = self.output {
            merge.output_path = output.clone();
        }
        if self.sample_size.is_some() {
            merge.sample_size = self.sample_size;
        }
        if self.parallel {
            merge.parallel = true;
        }
        if let Some(workers) = self.workers {
            merge.workers = workers;
        }
        if self.decode_date_buckets {
            merge.decode_date_buckets = true;
        }

        let storage = match create_storage(&config.storage) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to open storage: {e}");
                return Ok(4);
            }
        };

        let engine = match MergeEngine::new(storage, merge) {
            Ok(engine) => engine,
            Err(e) => {
                eprintln!("Invalid merge configuration: {e}");
                return Ok(2);
            }
        };

        // The engine blocks on file I/O and its own rayon pool
        let report = match tokio::task::spawn_blocking(move || engine.merge_all()).await? {
            Ok(report) => report,
            Err(SextantError::NoInputFiles(dir)) => {
                println!("No CSV files found under {}", dir.display());
                return Ok(1);
            }
            Err(e) => {
                tracing::error!(error = %e, "Merge failed");
                eprintln!("Merge failed: {e}");
                return Ok(5);
            }
        };

        println!();
        println!("📊 Merge Summary:");
        println!("  Files found: {}", report.files_found);
        println!("  Files merged: {}", report.files_merged);
        println!("  Files skipped: {}", report.files_skipped);
        println!("  Rows written: {}", report.rows_written);
        println!("  Columns: {}", report.columns.len());
        if let Some(ref backup) = report.backup_path {
            println!("  Previous output: {}", backup.display());
        }
        println!("  Output: {}", report.output_path.display());
        println!("  Duration: {:.2}s", report.duration.as_secs_f64());
        println!();

        Ok(if report.files_skipped == 0 { 0 } else { 1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_args_defaults() {
        let args = MergeArgs {
            input_dir: None,
            output: None,
            sample_size: None,
            parallel: false,
            workers: None,
            decode_date_buckets: false,
        };
        assert!(args.sample_size.is_none());
        assert!(!args.parallel);
    }
}
