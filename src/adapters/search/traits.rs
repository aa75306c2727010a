//! Cohort search collaborator interface

use crate::domain::{Result, Table};
use async_trait::async_trait;

/// One search for a set of patients in one index
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    /// Returned columns, in output order
    pub fields: Vec<String>,
    pub id_field: String,
    pub id_values: Vec<String>,
    /// Query-string expression, typically a filter plus a date range
    pub query: String,
}

/// Returns raw tabular records for patients and a date range
///
/// Implementations never retry; the batch cache decides what a failure means.
#[async_trait]
pub trait CohortSearch: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Table>;
}
