//! Core business logic for Sextant.
//!
//! # Modules
//!
//! - [`window`] - Global, individual and sub-window computation
//! - [`cache`] - Per-patient batch cache in front of the search service
//! - [`annotate`] - Concept annotation of cached document batches
//! - [`resolve`] - Earliest/latest index event across annotation sources
//! - [`index`] - Cohort index dataset built from resolved events
//! - [`merge`] - Union-schema merge of many CSV files
//! - [`pipeline`] - Per-patient run loop and run summary
//!
//! # Run Workflow
//!
//! 1. **Windows**: Compute the global window and any per-patient windows
//! 2. **Cohort**: Load patient ids from config, a list file or the window table
//! 3. **Batches**: Read each data type from the cache or fetch and cache it
//! 4. **Annotate**: Persist one annotation file per patient and source
//! 5. **Index**: Resolve index events over the persisted annotations
//! 6. **Merge**: Consolidate per-patient outputs into one CSV
//!
//! # Example
//!
//! ```rust,no_run
//! use sextant::config::load_config;
//! use sextant::core::pipeline::PipelineCoordinator;
//! use tokio::sync::watch;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sextant.toml")?;
//! let (_tx, rx) = watch::channel(false);
//! let coordinator = PipelineCoordinator::from_config(config, rx)?;
//! let summary = coordinator.execute().await?;
//! println!("Processed {} of {} patients", summary.processed_patients, summary.total_patients);
//! # Ok(())
//! # }
//! ```

pub mod annotate;
pub mod cache;
pub mod index;
pub mod merge;
pub mod pipeline;
pub mod resolve;
pub mod window;
