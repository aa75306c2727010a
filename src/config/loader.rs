//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{SextantConfig, StorageBackend};
use super::secret::secret_string;
use crate::domain::errors::SextantError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into SextantConfig
/// 4. Applies environment variable overrides (SEXTANT_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use sextant::config::loader::load_config;
///
/// let config = load_config("sextant.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<SextantConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SextantError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        SextantError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(contents: &str) -> Result<SextantConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: SextantConfig = toml::from_str(&contents)
        .map_err(|e| SextantError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        SextantError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied through untouched, so a commented-out placeholder
/// never requires its variable to be set.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(SextantError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(val) => val.parse().map(Some).map_err(|_| {
            SextantError::Configuration(format!("Invalid value for {name}: '{val}'"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|val| {
        val.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn parse_list<T: std::str::FromStr<Err = String>>(name: &str, values: Vec<String>) -> Result<Vec<T>> {
    values
        .iter()
        .map(|v| v.parse::<T>())
        .collect::<std::result::Result<Vec<T>, String>>()
        .map_err(|e| SextantError::Configuration(format!("Invalid value for {name}: {e}")))
}

/// Applies environment variable overrides using SEXTANT_* prefix
///
/// Environment variables follow the pattern: SEXTANT_<SECTION>_<KEY>
/// For example: SEXTANT_SEARCH_BASE_URL, SEXTANT_BATCH_FORCE_OVERWRITE.
/// List values are comma separated.
fn apply_env_overrides(config: &mut SextantConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("SEXTANT_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env_parse("SEXTANT_APPLICATION_DRY_RUN")? {
        config.application.dry_run = val;
    }

    // Window overrides
    if let Some(val) = env_parse("SEXTANT_WINDOW_LOOKBACK")? {
        config.window.lookback = val;
    }
    if let Some(val) = env_parse("SEXTANT_WINDOW_INTERVAL")? {
        config.window.interval = Some(val);
    }

    // Cohort overrides
    if let Ok(val) = std::env::var("SEXTANT_COHORT_PATIENT_LIST_PATH") {
        config.cohort.patient_list_path = Some(val);
    }
    if let Some(ids) = env_list("SEXTANT_COHORT_PATIENT_IDS") {
        config.cohort.patient_ids = ids;
    }

    // Storage overrides
    if let Ok(val) = std::env::var("SEXTANT_STORAGE_BACKEND") {
        config.storage.backend = match val.to_lowercase().as_str() {
            "local" => StorageBackend::Local,
            "remote" => StorageBackend::Remote,
            other => {
                return Err(SextantError::Configuration(format!(
                    "Invalid value for SEXTANT_STORAGE_BACKEND: '{other}'"
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("SEXTANT_STORAGE_ROOT_PATH") {
        config.storage.root_path = val;
    }
    if let Some(ref mut remote) = config.storage.remote {
        if let Ok(val) = std::env::var("SEXTANT_STORAGE_REMOTE_HOST") {
            remote.host = val;
        }
        if let Ok(val) = std::env::var("SEXTANT_STORAGE_REMOTE_USERNAME") {
            remote.username = val;
        }
        if let Ok(val) = std::env::var("SEXTANT_STORAGE_REMOTE_PASSWORD") {
            remote.password = Some(secret_string(val));
        }
        if let Some(val) = env_parse("SEXTANT_STORAGE_REMOTE_SHARE_CONNECTION")? {
            remote.share_connection = val;
        }
    }

    // Search overrides
    if let Ok(val) = std::env::var("SEXTANT_SEARCH_BASE_URL") {
        config.search.base_url = val;
    }
    if let Ok(val) = std::env::var("SEXTANT_SEARCH_USERNAME") {
        config.search.username = Some(val);
    }
    if let Ok(val) = std::env::var("SEXTANT_SEARCH_PASSWORD") {
        config.search.password = Some(secret_string(val));
    }
    if let Some(val) = env_parse("SEXTANT_SEARCH_TIMEOUT_SECONDS")? {
        config.search.timeout_seconds = val;
    }
    if let Some(val) = env_parse("SEXTANT_SEARCH_TLS_VERIFY")? {
        config.search.tls_verify = val;
    }

    // Batch overrides
    if let Some(val) = env_parse("SEXTANT_BATCH_FORCE_OVERWRITE")? {
        config.batch.force_overwrite = val;
    }
    if let Some(values) = env_list("SEXTANT_BATCH_DATA_TYPES") {
        config.batch.data_types = parse_list("SEXTANT_BATCH_DATA_TYPES", values)?;
    }

    // Annotation overrides
    if let Some(val) = env_parse("SEXTANT_ANNOTATION_ENABLED")? {
        config.annotation.enabled = val;
    }
    if let Ok(val) = std::env::var("SEXTANT_ANNOTATION_BASE_URL") {
        config.annotation.base_url = val;
    }
    if let Some(values) = env_list("SEXTANT_ANNOTATION_SOURCES") {
        config.annotation.sources = parse_list("SEXTANT_ANNOTATION_SOURCES", values)?;
    }

    // Index overrides
    if let Some(codes) = env_list("SEXTANT_INDEX_FILTER_CODES") {
        config.index.filter_codes = codes;
    }
    if let Some(val) = env_parse("SEXTANT_INDEX_MODE")? {
        config.index.mode = val;
    }
    if let Ok(val) = std::env::var("SEXTANT_INDEX_OUTPUT_PATH") {
        config.index.output_path = val;
    }

    // Merge overrides
    if let Ok(val) = std::env::var("SEXTANT_MERGE_INPUT_DIR") {
        config.merge.input_dir = val;
    }
    if let Ok(val) = std::env::var("SEXTANT_MERGE_OUTPUT_PATH") {
        config.merge.output_path = val;
    }
    if let Some(val) = env_parse("SEXTANT_MERGE_PARALLEL")? {
        config.merge.parallel = val;
    }
    if let Some(val) = env_parse("SEXTANT_MERGE_WORKERS")? {
        config.merge.workers = val;
    }

    // Logging overrides
    if let Some(val) = env_parse("SEXTANT_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Ok(val) = std::env::var("SEXTANT_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[window]
start_year = 2020
start_month = 1
start_day = 1
end_year = 2021
end_month = 1
end_day = 1

[search]
base_url = "https://search.example.org"
"#;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("SEXTANT_LOADER_TEST_VAR", "test_value");
        let input = "password = \"${SEXTANT_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("SEXTANT_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("SEXTANT_LOADER_MISSING_VAR");
        let input = "password = \"${SEXTANT_LOADER_MISSING_VAR}\"";
        let result = substitute_env_vars(input);
        assert!(result.is_err());
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        std::env::remove_var("SEXTANT_LOADER_COMMENTED_VAR");
        let input = "# password = \"${SEXTANT_LOADER_COMMENTED_VAR}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(SextantError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.window.start_year, 2020);
        assert_eq!(config.search.base_url, "https://search.example.org");
        assert_eq!(config.storage.root_path, ".");
        assert!(!config.window.lookback);
    }

    #[test]
    fn test_parse_config_with_sections() {
        let toml = format!(
            "{MINIMAL}\n[batch]\ndata_types = [\"epr_documents\", \"bloods\"]\n\n[index]\nmode = \"latest\"\nfilter_codes = [\"C1\"]\n"
        );
        let config = parse_config(&toml).unwrap();
        assert_eq!(config.batch.data_types.len(), 2);
        assert_eq!(config.index.mode, crate::domain::ResolveMode::Latest);
        assert_eq!(config.index.filter_codes, vec!["C1".to_string()]);
    }

    #[test]
    fn test_parse_config_interval() {
        let toml = MINIMAL.replace("[search]", "interval = \"1m\"\n\n[search]");
        let config = parse_config(&toml).unwrap();
        assert_eq!(config.window.interval.unwrap().months(), 1);
    }

    #[test]
    fn test_parse_config_invalid_is_configuration_error() {
        let toml = MINIMAL.replace("start_month = 1", "start_month = 14");
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("start_month"));
    }
}
