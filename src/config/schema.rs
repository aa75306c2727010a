//! Configuration schema types
//!
//! Every section has a `validate()` returning a human-readable message on the
//! first problem found, and `default_*` functions for optional settings.

use crate::config::SecretString;
use crate::domain::{AnnotationSource, DataType, DateParts, Interval, ResolveMode};
use serde::{Deserialize, Serialize};

/// Main Sextant configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SextantConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Global and individual time windows
    pub window: WindowConfig,

    /// Patients to process
    #[serde(default)]
    pub cohort: CohortConfig,

    /// Storage backend for caches and annotation batches
    #[serde(default)]
    pub storage: StorageConfig,

    /// Cohort search collaborator
    pub search: SearchConfig,

    /// Batch cache behaviour
    #[serde(default)]
    pub batch: BatchConfig,

    /// Concept-recognition engine and annotation sources
    #[serde(default)]
    pub annotation: AnnotationConfig,

    /// Index-event resolution
    #[serde(default)]
    pub index: IndexConfig,

    /// CSV merge engine
    #[serde(default)]
    pub merge: MergeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SextantConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.window.validate()?;
        self.cohort.validate()?;
        self.storage.validate()?;
        self.search.validate()?;
        self.batch.validate()?;
        self.annotation.validate()?;
        self.index.validate()?;
        self.merge.validate()?;
        self.logging.validate()?;

        // Every annotated source needs its documents fetched first
        if self.annotation.enabled {
            for source in &self.annotation.sources {
                if !self.batch.data_types.contains(&source.data_type()) {
                    return Err(format!(
                        "annotation source '{}' requires data type '{}' in batch.data_types",
                        source,
                        source.data_type()
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (fetch and annotate, but write nothing)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Time window configuration
///
/// The global window is given as a year/month/day sextuple. With `lookback`
/// set, `start_*` is the anchor and `end_*` lies before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub start_year: i32,
    pub start_month: u32,
    pub start_day: u32,
    pub end_year: i32,
    pub end_month: u32,
    pub end_day: u32,

    /// Walk backward from the anchor instead of forward
    #[serde(default)]
    pub lookback: bool,

    /// Sub-window length; the whole window is one sub-window when unset
    #[serde(default)]
    pub interval: Option<Interval>,

    /// Per-patient windows derived from an anchor column
    #[serde(default)]
    pub individual: Option<IndividualWindowConfig>,
}

impl WindowConfig {
    pub fn start_parts(&self) -> DateParts {
        DateParts::new(self.start_year, self.start_month, self.start_day)
    }

    pub fn end_parts(&self) -> DateParts {
        DateParts::new(self.end_year, self.end_month, self.end_day)
    }

    fn validate(&self) -> Result<(), String> {
        for (label, parts) in [("start", self.start_parts()), ("end", self.end_parts())] {
            if !(1..=9999).contains(&parts.year) {
                return Err(format!("window.{label}_year must be between 1 and 9999"));
            }
            if !(1..=12).contains(&parts.month) {
                return Err(format!("window.{label}_month must be between 1 and 12"));
            }
            if !(1..=31).contains(&parts.day) {
                return Err(format!("window.{label}_day must be between 1 and 31"));
            }
        }
        if let Some(ref individual) = self.individual {
            individual.validate()?;
        }
        Ok(())
    }
}

/// Individual window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndividualWindowConfig {
    /// CSV with one row per patient, read through the storage backend
    pub patient_table: String,

    /// Column holding the anchor timestamp
    pub anchor_column: String,

    /// Column holding the patient id
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Offset applied to the anchor
    pub duration: Interval,
}

impl IndividualWindowConfig {
    fn validate(&self) -> Result<(), String> {
        if self.patient_table.is_empty() {
            return Err("window.individual.patient_table cannot be empty".to_string());
        }
        if self.anchor_column.is_empty() {
            return Err("window.individual.anchor_column cannot be empty".to_string());
        }
        if self.id_column.is_empty() {
            return Err("window.individual.id_column cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Cohort configuration
///
/// Explicit ids win over the list file when both are given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortConfig {
    /// CSV file listing patients, read through the storage backend
    #[serde(default)]
    pub patient_list_path: Option<String>,

    /// Column holding the patient id in the list file
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Explicit patient ids
    #[serde(default)]
    pub patient_ids: Vec<String>,

    /// Optional list-file column with a per-patient start date
    #[serde(default)]
    pub start_date_column: Option<String>,
}

impl CohortConfig {
    fn validate(&self) -> Result<(), String> {
        if self.id_column.is_empty() {
            return Err("cohort.id_column cannot be empty".to_string());
        }
        if let Some(id) = self.patient_ids.iter().find(|id| id.trim().is_empty()) {
            return Err(format!("cohort.patient_ids contains an empty id: '{id}'"));
        }
        Ok(())
    }
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            patient_list_path: None,
            id_column: default_id_column(),
            patient_ids: Vec::new(),
            start_date_column: None,
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local filesystem
    #[default]
    Local,
    /// Remote filesystem over SSH
    Remote,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root under which every cache directory lives
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Remote filesystem settings (required if backend = remote)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteStorageConfig>,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), String> {
        if self.root_path.is_empty() {
            return Err("storage.root_path cannot be empty".to_string());
        }
        match self.backend {
            StorageBackend::Local => Ok(()),
            StorageBackend::Remote => match self.remote {
                Some(ref remote) => remote.validate(),
                None => Err(
                    "storage.remote configuration is required when backend = 'remote'".to_string(),
                ),
            },
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root_path: default_root_path(),
            remote: None,
        }
    }
}

/// Remote filesystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStorageConfig {
    pub host: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    pub username: String,

    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Reuse one connection for every operation
    ///
    /// A shared connection is not safe to use from several processes at once;
    /// disable it to open a private connection per call.
    #[serde(default = "default_true")]
    pub share_connection: bool,
}

impl RemoteStorageConfig {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.host.is_empty() {
            return Err("storage.remote.host cannot be empty".to_string());
        }
        if self.username.is_empty() {
            return Err("storage.remote.username cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("storage.remote.port must be > 0".to_string());
        }
        if self
            .password
            .as_ref()
            .map(|p| p.expose_secret().is_empty())
            .unwrap_or(true)
        {
            return Err("storage.remote.password cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Cohort search collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the search service
    pub base_url: String,

    #[serde(default)]
    pub username: Option<String>,

    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Maximum hits returned per request
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// TLS certificate verification enabled
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

impl SearchConfig {
    fn validate(&self) -> Result<(), String> {
        validate_base_url("search.base_url", &self.base_url)?;
        if self.page_size == 0 || self.page_size > 10_000 {
            return Err("search.page_size must be between 1 and 10000".to_string());
        }
        if self.timeout_seconds == 0 {
            return Err("search.timeout_seconds must be > 0".to_string());
        }
        if self.password.is_some() && self.username.is_none() {
            return Err("search.username is required when search.password is set".to_string());
        }
        Ok(())
    }
}

/// Batch cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Re-fetch even when a cache file exists
    #[serde(default)]
    pub force_overwrite: bool,

    /// Record kinds fetched for every patient
    #[serde(default = "default_data_types")]
    pub data_types: Vec<DataType>,

    /// Split long notes at date headers
    #[serde(default)]
    pub split_notes: bool,

    /// Fuzzy term filter for textual observations
    #[serde(default)]
    pub fuzzy: Option<FuzzyFilterConfig>,

    /// Regex term counts added to document batches
    #[serde(default)]
    pub term_counts: Vec<TermCountConfig>,
}

impl BatchConfig {
    fn validate(&self) -> Result<(), String> {
        if self.data_types.is_empty() {
            return Err("batch.data_types cannot be empty".to_string());
        }
        if let Some(ref fuzzy) = self.fuzzy {
            fuzzy.validate()?;
        }
        for term in &self.term_counts {
            term.validate()?;
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            force_overwrite: false,
            data_types: default_data_types(),
            split_notes: false,
            fuzzy: None,
            term_counts: Vec::new(),
        }
    }
}

/// Fuzzy term filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyFilterConfig {
    pub terms: Vec<String>,

    /// Jaro-Winkler similarity a token must reach
    #[serde(default = "default_fuzzy_threshold")]
    pub threshold: f64,
}

impl FuzzyFilterConfig {
    fn validate(&self) -> Result<(), String> {
        if self.terms.is_empty() {
            return Err("batch.fuzzy.terms cannot be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err("batch.fuzzy.threshold must be between 0.0 and 1.0".to_string());
        }
        Ok(())
    }
}

/// One regex term count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermCountConfig {
    pub name: String,
    pub pattern: String,
}

impl TermCountConfig {
    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("batch.term_counts name cannot be empty".to_string());
        }
        regex::Regex::new(&self.pattern)
            .map(|_| ())
            .map_err(|e| format!("batch.term_counts '{}' has an invalid pattern: {e}", self.name))
    }
}

/// Annotation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the concept-recognition engine
    #[serde(default = "default_annotator_url")]
    pub base_url: String,

    #[serde(default = "default_annotation_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Sources annotated for every patient
    #[serde(default = "default_annotation_sources")]
    pub sources: Vec<AnnotationSource>,

    /// Optional coding-system table joined onto every batch
    #[serde(default)]
    pub code_mapping_path: Option<String>,

    /// Join key shared by the batch and the coding-system table
    #[serde(default = "default_code_mapping_key")]
    pub code_mapping_key: String,
}

impl AnnotationConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        validate_base_url("annotation.base_url", &self.base_url)?;
        if self.timeout_seconds == 0 {
            return Err("annotation.timeout_seconds must be > 0".to_string());
        }
        if self.sources.is_empty() {
            return Err("annotation.sources cannot be empty when annotation is enabled".to_string());
        }
        if self.code_mapping_key.is_empty() {
            return Err("annotation.code_mapping_key cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_annotator_url(),
            timeout_seconds: default_annotation_timeout_seconds(),
            sources: default_annotation_sources(),
            code_mapping_path: None,
            code_mapping_key: default_code_mapping_key(),
        }
    }
}

/// Index-event resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Concept ids that qualify as the index event
    #[serde(default)]
    pub filter_codes: Vec<String>,

    #[serde(default)]
    pub mode: ResolveMode,

    /// Sources searched, in tie-break order
    #[serde(default = "default_index_sources")]
    pub sources: Vec<AnnotationSource>,

    /// Column used to fill gaps in `updatetime` and the other way round
    #[serde(default = "default_alternate_timestamp_column")]
    pub alternate_timestamp_column: String,

    /// Directory whose file names enumerate the cohort when no cohort is configured
    #[serde(default)]
    pub reference_dir: Option<String>,

    /// Local output path of the index table
    #[serde(default = "default_index_output_path")]
    pub output_path: String,

    #[serde(default)]
    pub filter: IndexFilterConfig,
}

impl IndexConfig {
    fn validate(&self) -> Result<(), String> {
        if self.sources.is_empty() {
            return Err("index.sources cannot be empty".to_string());
        }
        if self.alternate_timestamp_column.is_empty() {
            return Err("index.alternate_timestamp_column cannot be empty".to_string());
        }
        if self.output_path.is_empty() {
            return Err("index.output_path cannot be empty".to_string());
        }
        self.filter.validate()
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            filter_codes: Vec::new(),
            mode: ResolveMode::default(),
            sources: default_index_sources(),
            alternate_timestamp_column: default_alternate_timestamp_column(),
            reference_dir: None,
            output_path: default_index_output_path(),
            filter: IndexFilterConfig::default(),
        }
    }
}

/// Row-level thresholds applied before resolution
///
/// Empty value lists mean "any value".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexFilterConfig {
    #[serde(default)]
    pub min_accuracy: Option<f64>,

    #[serde(default)]
    pub min_context_similarity: Option<f64>,

    #[serde(default)]
    pub type_ids: Vec<String>,

    #[serde(default)]
    pub time_values: Vec<String>,

    #[serde(default)]
    pub presence_values: Vec<String>,

    #[serde(default)]
    pub subject_values: Vec<String>,
}

impl IndexFilterConfig {
    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("min_accuracy", self.min_accuracy),
            ("min_context_similarity", self.min_context_similarity),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(format!("index.filter.{name} must be between 0.0 and 1.0"));
                }
            }
        }
        Ok(())
    }
}

/// Merge engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Directory scanned recursively for CSV files
    #[serde(default = "default_merge_input_dir")]
    pub input_dir: String,

    /// Local output file
    #[serde(default = "default_merge_output_path")]
    pub output_path: String,

    /// Merge a random sample of this many files instead of all of them
    #[serde(default)]
    pub sample_size: Option<usize>,

    /// Files read per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default)]
    pub parallel: bool,

    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fold `date_bucket_*` one-hot columns back into one timestamp column
    #[serde(default)]
    pub decode_date_buckets: bool,
}

impl MergeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.input_dir.is_empty() {
            return Err("merge.input_dir cannot be empty".to_string());
        }
        if self.output_path.is_empty() {
            return Err("merge.output_path cannot be empty".to_string());
        }
        if self.chunk_size == 0 {
            return Err("merge.chunk_size must be > 0".to_string());
        }
        if self.workers == 0 || self.workers > 256 {
            return Err("merge.workers must be between 1 and 256".to_string());
        }
        if self.sample_size == Some(0) {
            return Err("merge.sample_size must be > 0 when set".to_string());
        }
        Ok(())
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            input_dir: default_merge_input_dir(),
            output_path: default_merge_output_path(),
            sample_size: None,
            chunk_size: default_chunk_size(),
            parallel: false,
            workers: default_workers(),
            decode_date_buckets: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }

    /// Console-only logging
    pub fn console_only() -> Self {
        Self {
            local_enabled: false,
            local_path: String::new(),
            local_rotation: default_local_rotation(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

fn validate_base_url(field: &str, url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(format!("{field} must start with http:// or https://"));
    }
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|e| format!("{field} is not a valid URL: {e}"))
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_id_column() -> String {
    crate::domain::PATIENT_ID_COLUMN.to_string()
}

fn default_root_path() -> String {
    ".".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_page_size() -> usize {
    10_000
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_data_types() -> Vec<DataType> {
    vec![DataType::EprDocuments]
}

fn default_fuzzy_threshold() -> f64 {
    0.9
}

fn default_annotator_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_annotation_timeout_seconds() -> u64 {
    300
}

fn default_annotation_sources() -> Vec<AnnotationSource> {
    vec![AnnotationSource::Epr]
}

fn default_code_mapping_key() -> String {
    "cui".to_string()
}

fn default_index_sources() -> Vec<AnnotationSource> {
    AnnotationSource::ALL.to_vec()
}

fn default_alternate_timestamp_column() -> String {
    "observationdocument_recordeddtm".to_string()
}

fn default_index_output_path() -> String {
    "index_events.csv".to_string()
}

fn default_merge_input_dir() -> String {
    "output_vectors".to_string()
}

fn default_merge_output_path() -> String {
    "merged.csv".to_string()
}

fn default_chunk_size() -> usize {
    500
}

fn default_workers() -> usize {
    4
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret::secret_string;

    fn window() -> WindowConfig {
        WindowConfig {
            start_year: 2020,
            start_month: 1,
            start_day: 1,
            end_year: 2021,
            end_month: 12,
            end_day: 31,
            lookback: false,
            interval: None,
            individual: None,
        }
    }

    fn search() -> SearchConfig {
        SearchConfig {
            base_url: "https://search.example.org".to_string(),
            username: Some("reader".to_string()),
            password: Some(secret_string("pw".to_string())),
            page_size: 1000,
            timeout_seconds: 30,
            tls_verify: true,
        }
    }

    fn config() -> SextantConfig {
        SextantConfig {
            application: ApplicationConfig::default(),
            window: window(),
            cohort: CohortConfig::default(),
            storage: StorageConfig::default(),
            search: search(),
            batch: BatchConfig::default(),
            annotation: AnnotationConfig::default(),
            index: IndexConfig::default(),
            merge: MergeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_config_validation() {
        let mut w = window();
        assert!(w.validate().is_ok());

        w.start_month = 13;
        assert!(w.validate().unwrap_err().contains("start_month"));

        w.start_month = 1;
        w.end_day = 0;
        assert!(w.validate().unwrap_err().contains("end_day"));
    }

    #[test]
    fn test_window_parts() {
        let w = window();
        assert_eq!(w.start_parts().padded(), "2020-01-01");
        assert_eq!(w.end_parts().padded(), "2021-12-31");
    }

    #[test]
    fn test_remote_storage_requires_section() {
        let mut storage = StorageConfig {
            backend: StorageBackend::Remote,
            ..StorageConfig::default()
        };
        assert!(storage.validate().is_err());

        storage.remote = Some(RemoteStorageConfig {
            host: "files.example.org".to_string(),
            port: 22,
            username: "svc".to_string(),
            password: Some(secret_string("pw".to_string())),
            share_connection: true,
        });
        assert!(storage.validate().is_ok());

        if let Some(ref mut remote) = storage.remote {
            remote.password = None;
        }
        assert!(storage.validate().is_err());
    }

    #[test]
    fn test_search_config_validation() {
        let mut s = search();
        assert!(s.validate().is_ok());

        s.base_url = "ftp://search".to_string();
        assert!(s.validate().is_err());

        s = search();
        s.page_size = 0;
        assert!(s.validate().is_err());

        s = search();
        s.username = None;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_annotation_source_needs_data_type() {
        let mut c = config();
        c.annotation.sources = vec![AnnotationSource::Mct];
        let err = c.validate().unwrap_err();
        assert!(err.contains("mct_documents"));

        c.batch.data_types.push(DataType::MctDocuments);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_disabled_annotation_skips_checks() {
        let mut c = config();
        c.annotation.enabled = false;
        c.annotation.base_url = String::new();
        c.annotation.sources = vec![AnnotationSource::Reports];
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_term_count_pattern_validated() {
        let mut batch = BatchConfig::default();
        batch.term_counts.push(TermCountConfig {
            name: "broken".to_string(),
            pattern: "(".to_string(),
        });
        assert!(batch.validate().is_err());
    }

    #[test]
    fn test_merge_config_validation() {
        let mut merge = MergeConfig::default();
        assert!(merge.validate().is_ok());

        merge.chunk_size = 0;
        assert!(merge.validate().is_err());

        merge = MergeConfig::default();
        merge.sample_size = Some(0);
        assert!(merge.validate().is_err());
    }

    #[test]
    fn test_index_filter_bounds() {
        let mut index = IndexConfig::default();
        index.filter.min_accuracy = Some(1.5);
        assert!(index.validate().is_err());
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.local_enabled);
        assert_eq!(config.local_path, "./logs");
        assert_eq!(config.local_rotation, "daily");
        assert!(LoggingConfig::console_only().validate().is_ok());
    }
}
