//! Cohort search collaborator

pub mod client;
pub mod traits;

pub use client::SearchClient;
pub use traits::{CohortSearch, SearchRequest};
