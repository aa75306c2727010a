//! Crate-wide `Result` alias over [`SextantError`]

use super::errors::SextantError;

/// Result type alias for Sextant operations
///
/// ```
/// use sextant::domain::{PatientId, Result, SextantError};
///
/// fn cohort_member(raw: &str) -> Result<PatientId> {
///     PatientId::new(raw).map_err(SextantError::Validation)
/// }
///
/// assert!(cohort_member("V001").is_ok());
/// assert!(matches!(cohort_member("  "), Err(SextantError::Validation(_))));
/// ```
pub type Result<T> = std::result::Result<T, SextantError>;
