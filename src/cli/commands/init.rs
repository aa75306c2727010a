//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "sextant.toml")]
    pub output: String,

    /// Include every section with example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Sextant configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your window and cohort", self.output);
                println!("  2. Create a .env file with your credentials:");
                println!("     - Set SEXTANT_SEARCH_USERNAME and SEXTANT_SEARCH_PASSWORD");
                println!("     - Set SEXTANT_STORAGE_REMOTE_PASSWORD (if using remote storage)");
                println!("  3. Validate configuration: sextant validate-config");
                println!("  4. Fill the cache and annotate: sextant run");
                println!("  5. Build the index table: sextant index");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Sextant Configuration File
# Time-windowed cohort extraction and annotation

[application]
log_level = "info"
dry_run = false

[window]
start_year = 2019
start_month = 1
start_day = 1
end_year = 2023
end_month = 12
end_day = 31
lookback = false

[cohort]
patient_list_path = "cohort.csv"
id_column = "client_idcode"

[storage]
backend = "local"
root_path = "./data"

[search]
base_url = "http://localhost:9200"
# username = "${SEXTANT_SEARCH_USERNAME}"
# password = "${SEXTANT_SEARCH_PASSWORD}"

[batch]
data_types = ["epr_documents"]

[annotation]
enabled = true
base_url = "http://localhost:5000"
sources = ["epr"]

[logging]
local_enabled = true
local_path = "./logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Sextant Configuration File
# Time-windowed cohort extraction and annotation
#
# Values of the form ${VAR_NAME} are replaced from the environment when the
# file is loaded. Any key can also be overridden with SEXTANT_<SECTION>_<KEY>,
# for example SEXTANT_APPLICATION_DRY_RUN=true.

[application]
# Log level: trace, debug, info, warn, error
log_level = "info"

# Fetch and annotate without writing cache or annotation files
dry_run = false

[window]
# Global time window. Out-of-range fields are clamped with a warning.
start_year = 2019
start_month = 1
start_day = 1
end_year = 2023
end_month = 12
end_day = 31

# Lookback mode: the start fields are the anchor (later date) and the window
# is walked backwards from it
lookback = false

# Optional sub-window length, e.g. "1d", "2w", "6m", "1y", "1y6m"
interval = "1y"

# Per-patient windows anchored on a date column of a patient table.
# Takes precedence over the global window for the patients it lists.
# [window.individual]
# patient_table = "cohort_anchors.csv"
# anchor_column = "diagnosis_date"
# id_column = "client_idcode"
# duration = "1y"

[cohort]
# CSV listing the cohort, read through the storage backend
patient_list_path = "cohort.csv"
id_column = "client_idcode"

# Optional per-patient date that may move the global window start forward
# start_date_column = "first_seen"

# Explicit ids take precedence over the list file
# patient_ids = ["V12345", "V67890"]

[storage]
# Backend: local or remote
backend = "local"

# Root under which every cache and annotation directory lives
root_path = "./data"

# [storage.remote]
# host = "hpc.example.org"
# port = 22
# username = "analyst"
# password = "${SEXTANT_STORAGE_REMOTE_PASSWORD}"
# # Reuse one session for every operation instead of connecting per call
# share_connection = true

[search]
base_url = "http://localhost:9200"
# username = "${SEXTANT_SEARCH_USERNAME}"
# password = "${SEXTANT_SEARCH_PASSWORD}"
page_size = 10000
timeout_seconds = 60
tls_verify = true

[batch]
# Re-fetch batches even when a cache file exists
force_overwrite = false

# Record kinds fetched per patient: epr_documents, mct_documents, textual_obs,
# reports, bloods, drugs, diagnostics, bmi, demographics
data_types = ["epr_documents", "mct_documents", "bloods", "drugs"]

# Split long notes at date headers into sub-documents
split_notes = false

# Keep only textual observations mentioning one of these terms
# [batch.fuzzy]
# terms = ["pulmonary embolism", "dvt"]
# threshold = 0.9

# Add <name>_count columns counting regex matches in document text
# [[batch.term_counts]]
# name = "smoking"
# pattern = "(?i)smok(er|ing)"

[annotation]
enabled = true
base_url = "http://localhost:5000"
timeout_seconds = 300

# Document sources annotated per patient: epr, mct, textual_obs, reports
sources = ["epr", "mct"]

# Optional coding-system table joined onto every annotation batch
# code_mapping_path = "snomed_mapping.csv"
# code_mapping_key = "cui"

[index]
# Concept ids that qualify as the index event; empty accepts any concept
filter_codes = ["C0034065"]

# earliest or latest
mode = "earliest"

# Sources searched, in tie-break order
sources = ["epr", "mct", "textual_obs", "reports"]

alternate_timestamp_column = "observationdocument_recordeddtm"
output_path = "index_events.csv"

# Directory whose file names enumerate the cohort when none is configured
# reference_dir = "current_pat_documents_annotations_epr"

[index.filter]
# min_accuracy = 0.8
# min_context_similarity = 0.5
# type_ids = ["T047"]
# time_values = ["Recent"]
# presence_values = ["True"]
# subject_values = ["Patient"]

[merge]
input_dir = "output_vectors"
output_path = "merged.csv"
# sample_size = 100
chunk_size = 500
parallel = false
workers = 4
decode_date_buckets = false

[logging]
# Console logging is always on; this adds rotating JSON files
local_enabled = true
local_path = "./logs"

# Rotation: daily, hourly, never
local_rotation = "daily"
"#
        .to_string()
    }
}
