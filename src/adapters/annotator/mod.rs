//! Concept-recognition engine adapter

pub mod client;
pub(crate) mod models;
pub mod traits;

pub use client::AnnotatorClient;
pub use traits::{ConceptAnnotator, DocumentAnnotations};
