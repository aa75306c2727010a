//! Free-text annotation of cached document batches

pub mod orchestrator;

pub use orchestrator::{
    annotation_path, context_window, AnnotationOrchestrator, AnnotationOutcome, AnnotationState,
    CONTEXT_CHARS,
};
