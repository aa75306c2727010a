//! Annotation domain models
//!
//! [`Entity`] mirrors what the concept-recognition engine returns for one
//! recognised concept. [`AnnotationRow`] is the flattened, persisted form, one
//! row per entity per document. [`AnnotationSource`] names the four free-text
//! record sources that can be annotated and resolved.

use super::table::Cell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Patient id column shared by every cached table
pub const PATIENT_ID_COLUMN: &str = "client_idcode";

/// Value and confidence of one meta-annotation (Time, Presence, Subject)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaAnnotation {
    pub value: String,
    #[serde(default)]
    pub confidence: f64,
}

/// One recognised concept instance within a text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub cui: String,
    #[serde(default)]
    pub pretty_name: String,
    #[serde(default)]
    pub type_ids: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub source_value: String,
    #[serde(default)]
    pub detected_name: String,
    #[serde(default)]
    pub acc: f64,
    #[serde(default)]
    pub context_similarity: f64,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub icd10: Vec<String>,
    #[serde(default)]
    pub opcs4: Vec<String>,
    #[serde(default)]
    pub meta_anns: HashMap<String, MetaAnnotation>,
}

impl Entity {
    /// Look up a meta-annotation by name
    ///
    /// `"Subject"` also matches the engine's `"Subject/Experiencer"` key.
    pub fn meta(&self, name: &str) -> Option<&MetaAnnotation> {
        self.meta_anns.get(name).or_else(|| {
            if name == "Subject" {
                self.meta_anns.get("Subject/Experiencer")
            } else {
                None
            }
        })
    }
}

/// Entities recognised in one text, keyed by the engine's internal id
pub type EntitySet = BTreeMap<String, Entity>;

/// The free-text sources that are annotated and resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSource {
    Epr,
    Mct,
    TextualObs,
    Reports,
}

impl AnnotationSource {
    pub const ALL: [AnnotationSource; 4] = [
        AnnotationSource::Epr,
        AnnotationSource::Mct,
        AnnotationSource::TextualObs,
        AnnotationSource::Reports,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AnnotationSource::Epr => "epr",
            AnnotationSource::Mct => "mct",
            AnnotationSource::TextualObs => "textual_obs",
            AnnotationSource::Reports => "reports",
        }
    }

    /// Directory under the storage root holding this source's annotation batches
    pub fn annotation_dir(&self) -> &'static str {
        match self {
            AnnotationSource::Epr => "current_pat_documents_annotations_epr",
            AnnotationSource::Mct => "current_pat_documents_annotations_mct",
            AnnotationSource::TextualObs => "current_pat_textual_obs_annotations",
            AnnotationSource::Reports => "current_pat_report_annotations",
        }
    }

    pub fn timestamp_column(&self) -> &'static str {
        match self {
            AnnotationSource::Epr | AnnotationSource::Reports => "updatetime",
            AnnotationSource::Mct => "observationdocument_recordeddtm",
            AnnotationSource::TextualObs => "basicobs_entered",
        }
    }

    pub fn document_id_column(&self) -> &'static str {
        match self {
            AnnotationSource::Epr => "document_guid",
            AnnotationSource::Mct => "observation_guid",
            AnnotationSource::TextualObs | AnnotationSource::Reports => "basicobs_guid",
        }
    }

    pub fn text_column(&self) -> &'static str {
        match self {
            AnnotationSource::Epr | AnnotationSource::Reports => "body_analysed",
            AnnotationSource::Mct => "observation_valuetext_analysed",
            AnnotationSource::TextualObs => "textualObs",
        }
    }

    /// Columns a row needs to be an index-event candidate at all
    pub fn identity_columns(&self) -> [&'static str; 3] {
        [PATIENT_ID_COLUMN, self.timestamp_column(), "cui"]
    }

    /// Columns every resolved record carries
    ///
    /// Only the [identity columns](Self::identity_columns) must be non-null;
    /// scores and meta-annotation values may be missing, for example when the
    /// engine runs without meta-annotation models.
    pub fn mandatory_columns(&self) -> Vec<&'static str> {
        vec![
            PATIENT_ID_COLUMN,
            self.timestamp_column(),
            "cui",
            "pretty_name",
            "source_value",
            "acc",
            "context_similarity",
            "time_value",
            "presence_value",
            "subject_value",
        ]
    }

    /// Full column layout of a persisted annotation batch, in output order
    pub fn annotation_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = vec![
            PATIENT_ID_COLUMN.to_string(),
            self.timestamp_column().to_string(),
        ];
        columns.extend(ANNOTATION_BODY_COLUMNS.iter().map(|c| c.to_string()));
        columns.push(self.document_id_column().to_string());
        columns
    }
}

impl fmt::Display for AnnotationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnnotationSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "epr" => Ok(AnnotationSource::Epr),
            "mct" => Ok(AnnotationSource::Mct),
            "textual_obs" | "textualobs" => Ok(AnnotationSource::TextualObs),
            "reports" | "report" => Ok(AnnotationSource::Reports),
            other => Err(format!(
                "Unknown annotation source '{other}'. Expected one of: epr, mct, textual_obs, reports"
            )),
        }
    }
}

/// Which end of the timeline the resolver picks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    #[default]
    Earliest,
    Latest,
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveMode::Earliest => f.write_str("earliest"),
            ResolveMode::Latest => f.write_str("latest"),
        }
    }
}

impl FromStr for ResolveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earliest" => Ok(ResolveMode::Earliest),
            "latest" => Ok(ResolveMode::Latest),
            other => Err(format!(
                "Invalid resolve mode '{other}'. Must be one of: earliest, latest"
            )),
        }
    }
}

/// Source-independent columns of an annotation batch, between timestamp and document id
const ANNOTATION_BODY_COLUMNS: [&str; 19] = [
    "cui",
    "pretty_name",
    "type_ids",
    "types",
    "source_value",
    "detected_name",
    "acc",
    "context_similarity",
    "start",
    "end",
    "icd10",
    "opcs4",
    "time_value",
    "time_confidence",
    "presence_value",
    "presence_confidence",
    "subject_value",
    "subject_confidence",
    "text_sample",
];

/// One persisted annotation: a recognised entity in the context of its document
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRow {
    pub patient_id: Option<String>,
    pub timestamp: Option<String>,
    pub entity: Entity,
    pub text_sample: String,
    pub document_id: Option<String>,
}

impl AnnotationRow {
    /// Cells in [`AnnotationSource::annotation_columns`] order
    pub fn into_cells(self) -> Vec<Cell> {
        let e = self.entity;
        let meta = |name: &str| e.meta(name).cloned();
        let (time, presence, subject) = (meta("Time"), meta("Presence"), meta("Subject"));
        let join = |values: &[String]| {
            if values.is_empty() {
                None
            } else {
                Some(values.join(";"))
            }
        };

        vec![
            self.patient_id,
            self.timestamp,
            Some(e.cui.clone()),
            Some(e.pretty_name.clone()),
            join(&e.type_ids),
            join(&e.types),
            Some(e.source_value.clone()),
            Some(e.detected_name.clone()),
            Some(e.acc.to_string()),
            Some(e.context_similarity.to_string()),
            Some(e.start.to_string()),
            Some(e.end.to_string()),
            join(&e.icd10),
            join(&e.opcs4),
            time.as_ref().map(|m| m.value.clone()),
            time.as_ref().map(|m| m.confidence.to_string()),
            presence.as_ref().map(|m| m.value.clone()),
            presence.as_ref().map(|m| m.confidence.to_string()),
            subject.as_ref().map(|m| m.value.clone()),
            subject.as_ref().map(|m| m.confidence.to_string()),
            Some(self.text_sample),
            self.document_id,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_json() -> serde_json::Value {
        serde_json::json!({
            "cui": "C0011849",
            "pretty_name": "Diabetes mellitus",
            "type_ids": ["T047"],
            "types": ["Disease or Syndrome"],
            "source_value": "diabetes",
            "detected_name": "diabetes",
            "acc": 0.97,
            "context_similarity": 0.97,
            "start": 10,
            "end": 18,
            "meta_anns": {
                "Time": {"value": "Recent", "confidence": 0.9, "name": "Time"},
                "Presence": {"value": "True", "confidence": 0.99, "name": "Presence"},
                "Subject/Experiencer": {"value": "Patient", "confidence": 0.95, "name": "Subject/Experiencer"}
            }
        })
    }

    #[test]
    fn test_entity_deserializes_with_defaults() {
        let entity: Entity = serde_json::from_value(serde_json::json!({
            "cui": "C1", "start": 0, "end": 3
        }))
        .unwrap();
        assert_eq!(entity.acc, 0.0);
        assert!(entity.meta_anns.is_empty());
    }

    #[test]
    fn test_subject_meta_alias() {
        let entity: Entity = serde_json::from_value(entity_json()).unwrap();
        assert_eq!(entity.meta("Subject").unwrap().value, "Patient");
        assert!(entity.meta("Missing").is_none());
    }

    #[test]
    fn test_row_cells_align_with_columns() {
        let entity: Entity = serde_json::from_value(entity_json()).unwrap();
        let row = AnnotationRow {
            patient_id: Some("P1".to_string()),
            timestamp: Some("2021-01-01".to_string()),
            entity,
            text_sample: "has diabetes".to_string(),
            document_id: Some("doc-1".to_string()),
        };
        for source in AnnotationSource::ALL {
            let columns = source.annotation_columns();
            let cells = row.clone().into_cells();
            assert_eq!(columns.len(), cells.len());
            let cui_idx = columns.iter().position(|c| c == "cui").unwrap();
            assert_eq!(cells[cui_idx].as_deref(), Some("C0011849"));
            let doc_idx = columns.len() - 1;
            assert_eq!(columns[doc_idx], source.document_id_column());
        }
    }

    #[test]
    fn test_mandatory_columns_are_in_layout() {
        for source in AnnotationSource::ALL {
            let columns = source.annotation_columns();
            for mandatory in source.mandatory_columns() {
                assert!(columns.iter().any(|c| c == mandatory), "{mandatory}");
            }
            for identity in source.identity_columns() {
                assert!(source.mandatory_columns().contains(&identity), "{identity}");
            }
        }
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!("EPR".parse::<AnnotationSource>().unwrap(), AnnotationSource::Epr);
        assert_eq!(
            "textual_obs".parse::<AnnotationSource>().unwrap(),
            AnnotationSource::TextualObs
        );
        assert!("letters".parse::<AnnotationSource>().is_err());
    }
}
