//! Cohort run orchestration
//!
//! [`PipelineCoordinator`] walks the cohort patient by patient; [`RunContext`]
//! collects skips across components and [`RunSummary`] reports the outcome.

pub mod context;
pub mod coordinator;
pub mod summary;

pub use context::{FailureRecord, RunContext};
pub use coordinator::{load_cohort, CohortMember, PipelineCoordinator};
pub use summary::RunSummary;
