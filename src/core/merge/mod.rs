//! Consolidation of many per-patient CSV files into one dataset
//!
//! ```rust,no_run
//! use sextant::adapters::storage::LocalStorage;
//! use sextant::config::MergeConfig;
//! use sextant::core::merge::MergeEngine;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = MergeEngine::new(Arc::new(LocalStorage::new(".")), MergeConfig::default())?;
//! let report = engine.merge_all()?;
//! println!("{} rows in {}", report.rows_written, report.output_path.display());
//! # Ok(())
//! # }
//! ```

pub mod date_decode;
pub mod engine;

pub use date_decode::{decode_date_buckets, DATE_BUCKET_PREFIX, DECODED_COLUMN};
pub use engine::{MergeEngine, MergeReport};
