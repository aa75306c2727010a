//! Index-event dataset for a whole cohort

pub mod builder;

pub use builder::{discover_patients, IndexBuilder};
