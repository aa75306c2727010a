//! External system integrations for Sextant.
//!
//! - [`storage`] - Local and remote filesystem behind one trait
//! - [`search`] - Cohort search collaborator (HTTP)
//! - [`annotator`] - Concept-recognition engine (HTTP)
//!
//! # Design Pattern
//!
//! Each boundary is a trait with a production implementation and, in tests,
//! in-memory fakes. Backends are chosen once at startup and handed around as
//! `Arc<dyn Trait>`.
//!
//! ```rust,no_run
//! use sextant::adapters::search::{CohortSearch, SearchClient, SearchRequest};
//! use sextant::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sextant.toml")?;
//! let client = SearchClient::new(&config.search)?;
//! let rows = client
//!     .search(&SearchRequest {
//!         index: "epr_documents".to_string(),
//!         fields: vec!["client_idcode".to_string(), "updatetime".to_string()],
//!         id_field: "client_idcode".to_string(),
//!         id_values: vec!["V001".to_string()],
//!         query: "updatetime:[2020-01-01 TO 2020-12-31]".to_string(),
//!     })
//!     .await?;
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod annotator;
pub mod search;
pub mod storage;
