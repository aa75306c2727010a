//! Concept-recognition engine interface

use crate::domain::{AnnotationError, EntitySet, Result};
use async_trait::async_trait;

/// Outcome for one submitted text
pub type DocumentAnnotations = std::result::Result<EntitySet, AnnotationError>;

/// Converts free text into entity annotations
///
/// `annotate_many` returns exactly one entry per input text, in input order.
/// A failure confined to one text is reported in that text's entry; an `Err`
/// from the call itself means nothing in the batch can be trusted.
#[async_trait]
pub trait ConceptAnnotator: Send + Sync {
    async fn annotate_many(&self, texts: &[String]) -> Result<Vec<DocumentAnnotations>>;
}
