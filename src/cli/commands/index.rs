//! Index command implementation
//!
//! Resolves one index event per patient from the persisted annotation batches
//! and writes the cohort index table.

use crate::adapters::storage::{create_storage, LocalStorage, Storage};
use crate::config::{load_config, SextantConfig};
use crate::core::index::{discover_patients, IndexBuilder};
use crate::core::pipeline::{load_cohort, CohortMember};
use crate::core::resolve::{IndexQuery, RecordResolver, FALLBACK_SOURCE, SOURCE_COLUMN};
use crate::core::window::WindowPlan;
use crate::domain::{ResolveMode, Result};
use clap::Args;
use std::path::Path;
use std::sync::Arc;

/// Arguments for the index command
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Override the output path of the index table
    #[arg(short, long)]
    pub output: Option<String>,

    /// Pick the latest matching event instead of the configured mode
    #[arg(long)]
    pub latest: bool,
}

/// Cohort for index building
///
/// A configured cohort is used as is, start dates included. Without one,
/// patients are discovered from `index.reference_dir`, falling back to the
/// first index source's annotation directory.
fn index_patients(
    config: &SextantConfig,
    storage: &dyn Storage,
    windows: &WindowPlan,
) -> Result<Vec<CohortMember>> {
    let cohort = &config.cohort;
    if !cohort.patient_ids.is_empty() || cohort.patient_list_path.is_some() || windows.has_individual() {
        return load_cohort(cohort, storage, windows);
    }

    let dir = match (&config.index.reference_dir, config.index.sources.first()) {
        (Some(dir), _) => dir.clone(),
        (None, Some(source)) => source.annotation_dir().to_string(),
        (None, None) => String::new(),
    };
    Ok(discover_patients(storage, Path::new(&dir))?
        .into_iter()
        .map(|patient_id| CohortMember {
            patient_id,
            start_date: None,
        })
        .collect())
}

impl IndexArgs {
    /// Execute the index command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting index command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };
        if let Some(ref output) = self.output {
            config.index.output_path = output.clone();
        }
        if self.latest {
            config.index.mode = ResolveMode::Latest;
        }

        let storage = match create_storage(&config.storage) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to open storage");
                eprintln!("Failed to open storage: {e}");
                return Ok(4);
            }
        };

        let windows = match WindowPlan::from_config(&config.window, storage.as_ref()) {
            Ok(w) => w,
            Err(e) => {
                eprintln!("Failed to compute windows: {e}");
                return Ok(2);
            }
        };

        let patients = match index_patients(&config, storage.as_ref(), &windows) {
            Ok(p) if !p.is_empty() => p,
            Ok(_) => {
                println!("No patients found to index.");
                return Ok(0);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load cohort");
                eprintln!("Failed to load cohort: {e}");
                return Ok(5);
            }
        };

        println!("🔎 Resolving index events for {} patients...", patients.len());

        let resolver = RecordResolver::new(Arc::clone(&storage), IndexQuery::from_config(&config.index));
        let builder = IndexBuilder::new(resolver, config.index.alternate_timestamp_column.clone());
        let table = builder.build_member_index(&patients, &windows);

        let fallbacks = table
            .iter()
            .filter(|row| row.get(SOURCE_COLUMN) == Some(FALLBACK_SOURCE))
            .count();

        let output = LocalStorage::new(".");
        if let Err(e) = output.write_table(Path::new(&config.index.output_path), &table) {
            tracing::error!(error = %e, "Failed to write index table");
            eprintln!("Failed to write index table: {e}");
            return Ok(5);
        }

        tracing::info!(
            patients = table.len(),
            fallbacks,
            output = %config.index.output_path,
            "Index table written"
        );
        println!();
        println!("📊 Index Summary:");
        println!("  Patients: {}", table.len());
        println!("  Resolved: {}", table.len() - fallbacks);
        println!("  Fallback: {fallbacks}");
        println!("  Output: {}", config.index.output_path);
        println!();

        Ok(if fallbacks == 0 { 0 } else { 1 })
    }
}
