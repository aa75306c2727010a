//! Domain error types
//!
//! This module defines the error hierarchy for Sextant. Adapter errors are kept
//! in their own enums so that third-party client types never leak past the
//! adapter boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Main Sextant error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum SextantError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Storage backend errors (local or remote filesystem)
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cohort search collaborator errors
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Concept-recognition engine errors
    #[error("Annotation error: {0}")]
    Annotation(#[from] AnnotationError),

    /// EPR document retrieval failed; downstream annotation cannot proceed
    #[error("Batch retrieval failed for patient {patient_id} ({data_type}): {reason}")]
    BatchRetrievalFailed {
        patient_id: String,
        data_type: String,
        reason: String,
    },

    /// Merge engine found nothing to merge
    #[error("No files found under {}", .0.display())]
    NoInputFiles(PathBuf),

    /// Merge engine errors other than missing input
    #[error("Merge error: {0}")]
    Merge(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Table shape or CSV codec errors
    #[error("Table error: {0}")]
    Table(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Storage-specific errors
///
/// Errors raised by the local or remote filesystem backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Path does not exist
    #[error("Path not found: {0}")]
    NotFound(String),

    /// Failed to read from storage
    #[error("Failed to read {path}: {message}")]
    ReadFailed { path: String, message: String },

    /// Failed to write to storage
    #[error("Failed to write {path}: {message}")]
    WriteFailed { path: String, message: String },

    /// Failed to list a directory
    #[error("Failed to list {path}: {message}")]
    ListFailed { path: String, message: String },

    /// Failed to connect to the remote filesystem
    #[error("Failed to connect to remote filesystem: {0}")]
    ConnectionFailed(String),

    /// Remote backend requested but not compiled in
    #[error("Unsupported storage backend: {0}")]
    Unsupported(String),
}

/// Cohort search collaborator errors
#[derive(Debug, Error)]
pub enum SearchError {
    /// Failed to connect to the search service
    #[error("Failed to connect to search service: {0}")]
    ConnectionFailed(String),

    /// Search request was rejected
    #[error("Search request failed: {status} - {message}")]
    RequestFailed { status: u16, message: String },

    /// Response could not be interpreted
    #[error("Invalid search response: {0}")]
    InvalidResponse(String),

    /// Query could not be built
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Concept-recognition engine errors
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// Failed to connect to the annotation engine
    #[error("Failed to connect to annotation engine: {0}")]
    ConnectionFailed(String),

    /// Engine rejected the request
    #[error("Annotation request failed: {status} - {message}")]
    RequestFailed { status: u16, message: String },

    /// Engine returned a different number of entity sets than texts sent
    #[error("Annotation engine returned {returned} entity sets for {expected} texts")]
    CountMismatch { expected: usize, returned: usize },

    /// Response could not be interpreted
    #[error("Invalid annotation response: {0}")]
    InvalidResponse(String),

    /// An entity's character span does not fit its document
    #[error("Entity span {start}..{end} outside document of length {len}")]
    SpanOutOfBounds { start: usize, end: usize, len: usize },
}

impl SextantError {
    /// Whether the caller may degrade to an empty result and continue
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SextantError::Configuration(_)
                | SextantError::NoInputFiles(_)
                | SextantError::BatchRetrievalFailed { .. }
        )
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for SextantError {
    fn from(err: std::io::Error) -> Self {
        SextantError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for SextantError {
    fn from(err: serde_json::Error) -> Self {
        SextantError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for SextantError {
    fn from(err: csv::Error) -> Self {
        SextantError::Table(format!("CSV error: {err}"))
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for SextantError {
    fn from(err: toml::de::Error) -> Self {
        SextantError::Configuration(format!("TOML parse error: {err}"))
    }
}
