//! Domain models and types for Sextant.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`PatientId`])
//! - **Tabular data** ([`Table`]) with nullable cells and a CSV codec
//! - **Time windows** ([`TimeWindow`], [`Interval`], [`DateParts`])
//! - **Record kinds** ([`DataType`]) and their cache/search layout
//! - **Annotation models** ([`Entity`], [`AnnotationRow`], [`AnnotationSource`])
//! - **Error types** ([`SextantError`], [`StorageError`], [`SearchError`], [`AnnotationError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, SextantError>`]:
//!
//! ```rust
//! use sextant::domain::{PatientId, Result, SextantError};
//!
//! fn parse(raw: &str) -> Result<PatientId> {
//!     PatientId::new(raw).map_err(SextantError::Validation)
//! }
//!
//! assert!(parse("V001").is_ok());
//! assert!(parse("").is_err());
//! ```

pub mod annotation;
pub mod context;
pub mod data_type;
pub mod errors;
pub mod ids;
pub mod result;
pub mod table;
pub mod window;

// Re-export commonly used types for convenience
pub use annotation::{
    AnnotationRow, AnnotationSource, Entity, EntitySet, MetaAnnotation, ResolveMode,
    PATIENT_ID_COLUMN,
};
pub use data_type::{DataType, DataTypeSpec, PostFilterKind};
pub use errors::{AnnotationError, SearchError, SextantError, StorageError};
pub use ids::PatientId;
pub use result::Result;
pub use table::{Cell, RowRef, Table};
pub use window::{DateParts, Interval, TimeWindow};
