//! Run command implementation
//!
//! This module implements the `run` command: fetch, cache and annotate every
//! patient in the cohort.

use crate::config::load_config;
use crate::core::pipeline::PipelineCoordinator;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run mode - fetch and annotate without writing any file
    #[arg(long)]
    pub dry_run: bool,

    /// Re-fetch batches even when a cache file exists
    #[arg(long)]
    pub force_overwrite: bool,

    /// Override patient ID(s) to process (comma-separated)
    #[arg(long)]
    pub patient_id: Option<String>,

    /// Skip annotation and only fill the batch cache
    #[arg(long)]
    pub no_annotate: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if let Some(ids) = &self.patient_id {
            let ids: Vec<String> = ids.split(',').map(|s| s.trim().to_string()).collect();
            tracing::info!(patient_ids = ?ids, "Overriding patient IDs from CLI");
            config.cohort.patient_ids = ids;
        }
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }
        if self.force_overwrite {
            tracing::info!("Forcing cache overwrite from CLI");
            config.batch.force_overwrite = true;
        }
        if self.no_annotate {
            tracing::info!("Disabling annotation from CLI");
            config.annotation.enabled = false;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        if config.application.dry_run {
            println!("🔍 DRY RUN MODE - No cache or annotation files will be written");
            println!();
        }

        if !self.yes && !config.application.dry_run {
            println!("Run Configuration:");
            println!("  Storage root: {}", config.storage.root_path);
            println!("  Search service: {}", config.search.base_url);
            println!("  Data types: {:?}", config.batch.data_types);
            println!(
                "  Annotation: {}",
                if config.annotation.enabled {
                    format!("{:?}", config.annotation.sources)
                } else {
                    "disabled".to_string()
                }
            );
            println!("  Lookback: {}", config.window.lookback);
            println!();
            print!("Proceed with run? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Run cancelled.");
                return Ok(0);
            }
        }

        let coordinator = match PipelineCoordinator::from_config(config, shutdown_signal) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create pipeline coordinator");
                eprintln!("Failed to initialize run: {e}");
                return Ok(4);
            }
        };

        println!("🚀 Starting run...");
        println!();

        let summary = match coordinator.execute().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Run failed");
                eprintln!("Run failed: {e}");
                return Ok(5);
            }
        };

        println!();
        println!("📊 Run Summary:");
        println!("  Patients: {}", summary.total_patients);
        println!("  Processed: {}", summary.processed_patients);
        println!("  Failed: {}", summary.failed_patients);
        println!("  Skipped steps: {}", summary.skipped_steps);
        println!("  Batches: {}", summary.batches);
        println!(
            "  Annotations: {} written, {} reused",
            summary.annotations_persisted, summary.annotations_reused
        );
        if summary.sub_windows > 0 {
            println!(
                "  Sub-windows: {} ({} rows)",
                summary.sub_windows, summary.rows_in_sub_windows
            );
        }
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!("  Completion: {:.2}%", summary.completion_rate());
        println!();

        if !summary.failures.is_empty() {
            println!("⚠️  Failures:");
            for failure in summary.failures.iter().take(10) {
                println!("  - {} [{}]: {}", failure.patient_id, failure.scope, failure.message);
            }
            if summary.failures.len() > 10 {
                println!("  ... and {} more failures", summary.failures.len() - 10);
            }
            println!();
        }

        let exit_code = if summary.interrupted {
            println!("⚠️  Run interrupted. Cached batches and annotations are kept.");
            println!("   Run the same command to continue.");
            130
        } else if summary.is_successful() {
            println!("✅ Run completed successfully!");
            0
        } else {
            println!("⚠️  Run completed with failures");
            1
        };

        Ok(exit_code)
    }
}
