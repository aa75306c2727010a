//! Row-level predicate over annotation rows

use crate::config::IndexFilterConfig;
use crate::domain::RowRef;

/// Thresholds and allowed values an annotation row must satisfy
///
/// Value comparisons ignore case. A threshold on a missing or non-numeric
/// cell fails the row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationFilter {
    min_accuracy: Option<f64>,
    min_context_similarity: Option<f64>,
    type_ids: Vec<String>,
    time_values: Vec<String>,
    presence_values: Vec<String>,
    subject_values: Vec<String>,
}

fn lowercased(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

fn at_least(cell: Option<&str>, threshold: Option<f64>) -> bool {
    match threshold {
        None => true,
        Some(min) => cell
            .and_then(|v| v.trim().parse::<f64>().ok())
            .is_some_and(|v| v >= min),
    }
}

fn one_of(cell: Option<&str>, allowed: &[String]) -> bool {
    allowed.is_empty() || cell.is_some_and(|v| allowed.contains(&v.to_lowercase()))
}

impl AnnotationFilter {
    pub fn from_config(config: &IndexFilterConfig) -> Self {
        Self {
            min_accuracy: config.min_accuracy,
            min_context_similarity: config.min_context_similarity,
            type_ids: lowercased(&config.type_ids),
            time_values: lowercased(&config.time_values),
            presence_values: lowercased(&config.presence_values),
            subject_values: lowercased(&config.subject_values),
        }
    }

    /// True when the filter accepts every row
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, row: &RowRef<'_>) -> bool {
        let type_ok = self.type_ids.is_empty()
            || row.get("type_ids").is_some_and(|ids| {
                ids.split(';')
                    .any(|id| self.type_ids.contains(&id.trim().to_lowercase()))
            });

        type_ok
            && at_least(row.get("acc"), self.min_accuracy)
            && at_least(row.get("context_similarity"), self.min_context_similarity)
            && one_of(row.get("time_value"), &self.time_values)
            && one_of(row.get("presence_value"), &self.presence_values)
            && one_of(row.get("subject_value"), &self.subject_values)
    }
}
