//! Error context extension trait
//!
//! `.context()` and `.with_context()` for `Result<T, SextantError>`, in the
//! spirit of `anyhow::Context`, so library code can say which file or patient
//! an error belongs to without leaving the typed error.
//!
//! # Examples
//!
//! ```rust
//! use sextant::domain::Result;
//! use sextant::domain::context::ResultExt;
//!
//! fn read_cohort(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .map_err(|e| sextant::domain::SextantError::Io(e.to_string()))
//!         .with_context(|| format!("Failed to read cohort list {path}"))
//! }
//! ```

use crate::domain::errors::SextantError;
use crate::domain::result::Result;

/// Extension trait for adding context to `Result` types
pub trait ResultExt<T> {
    /// Prefix the error message with `context`
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Like [`ResultExt::context`], evaluated only on error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SextantError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| wrap(context, e.into()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| wrap(f(), e.into()))
    }
}

/// Configuration errors stay configuration errors so the CLI exit code holds
fn wrap<C: std::fmt::Display>(context: C, base: SextantError) -> SextantError {
    match base {
        SextantError::Configuration(message) => {
            SextantError::Configuration(format!("{context}: {message}"))
        }
        other => SextantError::Other(format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{SearchError, StorageError};

    #[test]
    fn test_context_wraps_storage_error() {
        let result: std::result::Result<(), StorageError> =
            Err(StorageError::NotFound("cohort.csv".to_string()));
        let err = result.context("Failed to read cohort list").unwrap_err();

        assert!(matches!(err, SextantError::Other(_)));
        let message = err.to_string();
        assert!(message.contains("Failed to read cohort list"));
        assert!(message.contains("cohort.csv"));
    }

    #[test]
    fn test_configuration_errors_keep_their_variant() {
        let result: Result<()> = Err(SextantError::Configuration("bad column".to_string()));
        let err = result.context("anchors.csv").unwrap_err();
        assert!(matches!(err, SextantError::Configuration(ref m) if m == "anchors.csv: bad column"));
    }

    #[test]
    fn test_with_context_is_lazy() {
        let mut called = false;
        let result: Result<u32> = Ok(7);
        let value = result
            .with_context(|| {
                called = true;
                "unused"
            })
            .unwrap();
        assert_eq!(value, 7);
        assert!(!called);
    }

    #[test]
    fn test_with_context_on_search_error() {
        let result: std::result::Result<(), SearchError> =
            Err(SearchError::ConnectionFailed("refused".to_string()));
        let err = result
            .with_context(|| format!("patient {}", "V001"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "patient V001: Search error: Failed to connect to search service: refused"
        );
    }
}
