//! Wire models for the concept-recognition engine's bulk endpoint

use crate::domain::{Entity, EntitySet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub(crate) struct BulkRequest<'a> {
    pub content: Vec<TextItem<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TextItem<'a> {
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkResponse {
    pub result: Vec<DocumentResult>,
}

/// One entry per submitted text
#[derive(Debug, Deserialize)]
pub(crate) struct DocumentResult {
    #[serde(default)]
    pub annotations: Option<Annotations>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Engines return either an id-keyed map or a bare list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Annotations {
    Keyed(BTreeMap<String, Entity>),
    Listed(Vec<Entity>),
}

impl Annotations {
    pub fn into_entity_set(self) -> EntitySet {
        match self {
            Annotations::Keyed(map) => map,
            Annotations::Listed(list) => list
                .into_iter()
                .enumerate()
                .map(|(i, e)| (i.to_string(), e))
                .collect(),
        }
    }
}
