//! Configuration management for Sextant.
//!
//! Sextant uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SEXTANT_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sextant::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sextant.toml")?;
//!
//! println!("Search service: {}", config.search.base_url);
//! println!("Lookback: {}", config.window.lookback);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry run
//! - [`WindowConfig`] - Global window sextuple, lookback, sub-window interval, individual windows
//! - [`CohortConfig`] - Patient list file or explicit ids
//! - [`StorageConfig`] - Local or remote filesystem
//! - [`SearchConfig`] - Cohort search collaborator
//! - [`BatchConfig`] - Data types, overwrite policy, post-filters
//! - [`AnnotationConfig`] - Concept-recognition engine and sources
//! - [`IndexConfig`] - Index-event resolution
//! - [`MergeConfig`] - CSV merge engine
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [window]
//! start_year = 2019
//! start_month = 1
//! start_day = 1
//! end_year = 2023
//! end_month = 12
//! end_day = 31
//! interval = "1y"
//!
//! [search]
//! base_url = "https://search.example.org"
//! username = "reader"
//! password = "${SEXTANT_SEARCH_PASSWORD}"
//!
//! [batch]
//! data_types = ["epr_documents", "bloods"]
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    AnnotationConfig, ApplicationConfig, BatchConfig, CohortConfig, FuzzyFilterConfig,
    IndexConfig, IndexFilterConfig, IndividualWindowConfig, LoggingConfig, MergeConfig,
    RemoteStorageConfig, SearchConfig, SextantConfig, StorageBackend, StorageConfig,
    TermCountConfig, WindowConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
