//! Per-patient batch retrieval with a file cache
//!
//! - [`BatchCacheManager`] - cache-or-fetch for one patient and data type
//! - [`build_query`] - query string for a data type and window
//! - [`PostFilters`] - fuzzy term filter, term counts and note splitting

pub mod filters;
pub mod manager;
pub mod note_splitter;
pub mod query;

pub use filters::{FuzzyTermFilter, PostFilters, TermCounter};
pub use manager::{cache_path, BatchCacheManager, FetchedBatch};
pub use note_splitter::split_notes;
pub use query::build_query;
