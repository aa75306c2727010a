//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Sextant configuration file.

use crate::config::{load_config, StorageBackend};
use crate::core::window::compute_global_window;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates every section
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded and validated");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let window = match compute_global_window(&config.window) {
            Ok(w) => w,
            Err(e) => {
                println!("❌ Global window cannot be computed");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  Global Window: {window}");
        println!("  Lookback: {}", config.window.lookback);
        if let Some(interval) = config.window.interval {
            println!("  Sub-window Interval: {interval}");
        }
        if let Some(ref individual) = config.window.individual {
            println!(
                "  Individual Windows: {} ({} + {})",
                individual.patient_table, individual.anchor_column, individual.duration
            );
        }
        match (&config.cohort.patient_list_path, config.cohort.patient_ids.len()) {
            (_, n) if n > 0 => println!("  Cohort: {n} explicit patient IDs"),
            (Some(path), _) => println!("  Cohort: {path} ({})", config.cohort.id_column),
            (None, _) => println!("  Cohort: from window table or index reference directory"),
        }
        match config.storage.backend {
            StorageBackend::Local => println!("  Storage: local {}", config.storage.root_path),
            StorageBackend::Remote => {
                if let Some(ref remote) = config.storage.remote {
                    println!(
                        "  Storage: remote {}@{}:{} {}",
                        remote.username, remote.host, remote.port, config.storage.root_path
                    );
                }
            }
        }
        println!("  Search Service: {}", config.search.base_url);
        println!("  Data Types: {:?}", config.batch.data_types);
        if config.annotation.enabled {
            println!("  Annotation Engine: {}", config.annotation.base_url);
            println!("  Annotation Sources: {:?}", config.annotation.sources);
        } else {
            println!("  Annotation: disabled");
        }
        println!(
            "  Index: {} over {:?}, {} filter codes",
            config.index.mode,
            config.index.sources,
            config.index.filter_codes.len()
        );
        println!("  Merge: {} -> {}", config.merge.input_dir, config.merge.output_path);
        println!();
        Ok(0)
    }
}
