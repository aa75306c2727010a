//! Multi-source index-event resolution

pub mod filter;
pub mod resolver;

pub use filter::AnnotationFilter;
pub use resolver::{
    IndexEventRecord, IndexQuery, RecordResolver, CANONICAL_TIMESTAMP, FALLBACK_SOURCE,
    SOURCE_COLUMN,
};
