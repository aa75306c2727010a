//! Catalogue of the record kinds fetched per patient
//!
//! Each [`DataType`] knows where its batches are cached, which search index it
//! is fetched from, which fields come back, and how its rows are timestamped.

use super::annotation::{AnnotationSource, PATIENT_ID_COLUMN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Post-processing step applied to a freshly fetched batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilterKind {
    /// Keep rows whose text fuzzily matches a configured term
    FuzzyTerms,
    /// Add `<name>_count` columns from configured regexes
    TermCounts,
    /// Split long notes at date headers into sub-documents
    NoteSplitter,
}

/// Static description of one record kind
#[derive(Debug, Clone)]
pub struct DataTypeSpec {
    pub cache_dir: &'static str,
    pub index: &'static str,
    pub fields: &'static [&'static str],
    pub timestamp_column: &'static str,
    pub filter: Option<&'static str>,
    pub text_column: Option<&'static str>,
    pub document_id_column: Option<&'static str>,
    pub post_filters: &'static [PostFilterKind],
}

impl DataTypeSpec {
    pub fn id_field(&self) -> &'static str {
        PATIENT_ID_COLUMN
    }

    /// Rows with a null in any of these columns are dropped before caching
    pub fn mandatory_columns(&self) -> Vec<&'static str> {
        let mut columns = vec![PATIENT_ID_COLUMN, self.timestamp_column];
        if let Some(text) = self.text_column {
            columns.push(text);
        }
        columns
    }
}

/// Record kinds that can be fetched and cached per patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    EprDocuments,
    MctDocuments,
    TextualObs,
    Reports,
    Bloods,
    Drugs,
    Diagnostics,
    Bmi,
    Demographics,
}

impl DataType {
    pub const ALL: [DataType; 9] = [
        DataType::EprDocuments,
        DataType::MctDocuments,
        DataType::TextualObs,
        DataType::Reports,
        DataType::Bloods,
        DataType::Drugs,
        DataType::Diagnostics,
        DataType::Bmi,
        DataType::Demographics,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DataType::EprDocuments => "epr_documents",
            DataType::MctDocuments => "mct_documents",
            DataType::TextualObs => "textual_obs",
            DataType::Reports => "reports",
            DataType::Bloods => "bloods",
            DataType::Drugs => "drugs",
            DataType::Diagnostics => "diagnostics",
            DataType::Bmi => "bmi",
            DataType::Demographics => "demographics",
        }
    }

    pub fn spec(&self) -> DataTypeSpec {
        use PostFilterKind::*;
        match self {
            DataType::EprDocuments => DataTypeSpec {
                cache_dir: "current_pat_documents_epr",
                index: "epr_documents",
                fields: &[
                    "client_idcode",
                    "document_guid",
                    "document_description",
                    "body_analysed",
                    "updatetime",
                    "clientvisit_visitidcode",
                ],
                timestamp_column: "updatetime",
                filter: None,
                text_column: Some("body_analysed"),
                document_id_column: Some("document_guid"),
                post_filters: &[NoteSplitter, TermCounts],
            },
            DataType::MctDocuments => DataTypeSpec {
                cache_dir: "current_pat_documents_mct",
                index: "observations",
                fields: &[
                    "client_idcode",
                    "observation_guid",
                    "observation_valuetext_analysed",
                    "observationdocument_recordeddtm",
                    "clientvisit_visitidcode",
                ],
                timestamp_column: "observationdocument_recordeddtm",
                filter: Some(r#"obscatalogmasteritem_displayname:("AoMRC_ClinicalSummary_FT")"#),
                text_column: Some("observation_valuetext_analysed"),
                document_id_column: Some("observation_guid"),
                post_filters: &[NoteSplitter],
            },
            DataType::TextualObs => DataTypeSpec {
                cache_dir: "current_pat_textual_obs_document",
                index: "basic_observations",
                fields: &[
                    "client_idcode",
                    "basicobs_guid",
                    "basicobs_itemname_analysed",
                    "textualObs",
                    "basicobs_entered",
                    "clientvisit_serviceguid",
                ],
                timestamp_column: "basicobs_entered",
                filter: Some("_exists_:textualObs"),
                text_column: Some("textualObs"),
                document_id_column: Some("basicobs_guid"),
                post_filters: &[FuzzyTerms],
            },
            DataType::Reports => DataTypeSpec {
                cache_dir: "current_pat_reports",
                index: "basic_observations",
                fields: &[
                    "client_idcode",
                    "basicobs_guid",
                    "basicobs_itemname_analysed",
                    "body_analysed",
                    "updatetime",
                ],
                timestamp_column: "updatetime",
                filter: Some(r#"basicobs_itemname_analysed:"report""#),
                text_column: Some("body_analysed"),
                document_id_column: Some("basicobs_guid"),
                post_filters: &[],
            },
            DataType::Bloods => DataTypeSpec {
                cache_dir: "current_pat_bloods",
                index: "basic_observations",
                fields: &[
                    "client_idcode",
                    "basicobs_itemname_analysed",
                    "basicobs_value_numeric",
                    "basicobs_entered",
                    "clientvisit_serviceguid",
                ],
                timestamp_column: "basicobs_entered",
                filter: Some("_exists_:basicobs_value_numeric"),
                text_column: None,
                document_id_column: None,
                post_filters: &[],
            },
            DataType::Drugs => DataTypeSpec {
                cache_dir: "current_pat_drugs",
                index: "order",
                fields: &[
                    "client_idcode",
                    "order_guid",
                    "order_name",
                    "order_summaryline",
                    "order_holdreasontext",
                    "order_entered",
                    "order_createdwhen",
                ],
                timestamp_column: "order_createdwhen",
                filter: Some(r#"order_typecode:"medication""#),
                text_column: None,
                document_id_column: Some("order_guid"),
                post_filters: &[],
            },
            DataType::Diagnostics => DataTypeSpec {
                cache_dir: "current_pat_diagnostics",
                index: "order",
                fields: &[
                    "client_idcode",
                    "order_guid",
                    "order_name",
                    "order_summaryline",
                    "order_entered",
                    "order_createdwhen",
                ],
                timestamp_column: "order_createdwhen",
                filter: Some(r#"order_typecode:"diagnostic""#),
                text_column: None,
                document_id_column: Some("order_guid"),
                post_filters: &[],
            },
            DataType::Bmi => DataTypeSpec {
                cache_dir: "current_pat_bmi",
                index: "observations",
                fields: &[
                    "client_idcode",
                    "obscatalogmasteritem_displayname",
                    "observation_valuetext_analysed",
                    "observationdocument_recordeddtm",
                ],
                timestamp_column: "observationdocument_recordeddtm",
                filter: Some(
                    r#"obscatalogmasteritem_displayname:("OBS BMI" OR "OBS Weight" OR "OBS Height")"#,
                ),
                text_column: None,
                document_id_column: None,
                post_filters: &[],
            },
            DataType::Demographics => DataTypeSpec {
                cache_dir: "current_pat_demographics",
                index: "epr_documents",
                fields: &[
                    "client_idcode",
                    "client_firstname",
                    "client_lastname",
                    "client_dob",
                    "client_gendercode",
                    "client_racecode",
                    "client_deceaseddtm",
                    "updatetime",
                ],
                timestamp_column: "updatetime",
                filter: None,
                text_column: None,
                document_id_column: None,
                post_filters: &[],
            },
        }
    }

    /// The annotation source fed from this record kind, if any
    pub fn annotation_source(&self) -> Option<AnnotationSource> {
        match self {
            DataType::EprDocuments => Some(AnnotationSource::Epr),
            DataType::MctDocuments => Some(AnnotationSource::Mct),
            DataType::TextualObs => Some(AnnotationSource::TextualObs),
            DataType::Reports => Some(AnnotationSource::Reports),
            _ => None,
        }
    }

    /// Whether a retrieval failure for this kind must abort the patient
    pub fn is_critical(&self) -> bool {
        matches!(self, DataType::EprDocuments)
    }
}

impl AnnotationSource {
    /// The record kind whose cached batches feed this source
    pub fn data_type(&self) -> DataType {
        match self {
            AnnotationSource::Epr => DataType::EprDocuments,
            AnnotationSource::Mct => DataType::MctDocuments,
            AnnotationSource::TextualObs => DataType::TextualObs,
            AnnotationSource::Reports => DataType::Reports,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        DataType::ALL
            .into_iter()
            .find(|dt| dt.name() == lowered)
            .ok_or_else(|| {
                let names: Vec<&str> = DataType::ALL.iter().map(DataType::name).collect();
                format!("Unknown data type '{s}'. Expected one of: {}", names.join(", "))
            })
    }
}
