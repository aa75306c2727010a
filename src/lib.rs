// Sextant - Time-windowed cohort extraction and annotation
// Copyright (c) 2025 Sextant Contributors
// Licensed under the MIT License

//! # Sextant - time-windowed cohort extraction and annotation
//!
//! Sextant pulls per-patient clinical records from a search service over a
//! configurable time window, caches them as CSV, annotates free-text documents
//! with a concept-recognition engine, resolves an index event per patient and
//! merges heterogeneous per-patient outputs into one dataset.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Windows, batch cache, annotation, resolution, index, merge, pipeline
//! - [`adapters`] - Storage backends, search service and annotation engine clients
//! - [`domain`] - Identifiers, tables, windows, annotation models, errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sextant::config::load_config;
//! use sextant::core::pipeline::PipelineCoordinator;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("sextant.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     let coordinator = PipelineCoordinator::from_config(config, shutdown_rx)?;
//!     let summary = coordinator.execute().await?;
//!
//!     println!("Processed {} patients", summary.processed_patients);
//!     Ok(())
//! }
//! ```
//!
//! ## Time Windows
//!
//! The global window comes from a year/month/day sextuple. In lookback mode
//! the start fields are the anchor and the window extends backwards:
//!
//! ```rust,no_run
//! use sextant::config::load_config;
//! use sextant::core::window::{compute_global_window, generate_sub_windows};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sextant.toml")?;
//! let window = compute_global_window(&config.window)?;
//! if let Some(interval) = config.window.interval {
//!     for sub in generate_sub_windows(window, interval, config.window.lookback) {
//!         println!("{sub}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Index Events
//!
//! ```rust,no_run
//! use sextant::adapters::storage::LocalStorage;
//! use sextant::config::IndexConfig;
//! use sextant::core::resolve::{IndexQuery, RecordResolver};
//! use sextant::domain::{PatientId, TimeWindow};
//! use std::sync::Arc;
//!
//! # fn example(window: TimeWindow) -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = RecordResolver::new(
//!     Arc::new(LocalStorage::new("./data")),
//!     IndexQuery::from_config(&IndexConfig::default()),
//! );
//! let record = resolver.resolve_index_event(&PatientId::new("V12345")?, &window, false)?;
//! println!("{} from {}", record.updatetime().unwrap_or("-"), record.source);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::Result`], an alias over [`domain::SextantError`];
//! the CLI maps failures to exit codes.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
