//! HTTP client for the concept-recognition engine

use super::models::{BulkRequest, BulkResponse, TextItem};
use super::traits::{ConceptAnnotator, DocumentAnnotations};
use crate::config::AnnotationConfig;
use crate::domain::{AnnotationError, EntitySet, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Client for `POST {base_url}/api/process_bulk`
pub struct AnnotatorClient {
    base_url: String,
    client: Client,
}

impl AnnotatorClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &AnnotationConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AnnotationError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl ConceptAnnotator for AnnotatorClient {
    async fn annotate_many(&self, texts: &[String]) -> Result<Vec<DocumentAnnotations>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/process_bulk", self.base_url);
        let body = BulkRequest {
            content: texts.iter().map(|t| TextItem { text: t }).collect(),
        };
        tracing::debug!(texts = texts.len(), "Submitting texts for annotation");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnnotationError::ConnectionFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(AnnotationError::RequestFailed { status, message }.into());
        }

        let parsed: BulkResponse = resp
            .json()
            .await
            .map_err(|e| AnnotationError::InvalidResponse(e.to_string()))?;

        if parsed.result.len() != texts.len() {
            return Err(AnnotationError::CountMismatch {
                expected: texts.len(),
                returned: parsed.result.len(),
            }
            .into());
        }

        Ok(parsed
            .result
            .into_iter()
            .map(|doc| match (doc.error, doc.annotations) {
                (Some(error), _) => Err(AnnotationError::InvalidResponse(error)),
                (None, Some(annotations)) => Ok(annotations.into_entity_set()),
                (None, None) => Ok(EntitySet::new()),
            })
            .collect())
    }
}
