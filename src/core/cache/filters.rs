//! Post-filters applied to freshly fetched batches
//!
//! Which filters run for a data type is fixed by its catalogue entry; whether
//! each one is active is decided by the `[batch]` configuration.

use super::note_splitter::split_notes;
use crate::config::{BatchConfig, FuzzyFilterConfig, TermCountConfig};
use crate::domain::{DataType, PostFilterKind, Result, SextantError, Table};
use regex::Regex;

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Keeps rows whose text fuzzily mentions one of a set of terms
///
/// Multi-word terms are compared against runs of the same number of tokens.
#[derive(Debug, Clone)]
pub struct FuzzyTermFilter {
    terms: Vec<Vec<String>>,
    threshold: f64,
}

impl FuzzyTermFilter {
    pub fn new(config: &FuzzyFilterConfig) -> Self {
        Self {
            terms: config
                .terms
                .iter()
                .map(|t| tokens(t))
                .filter(|t| !t.is_empty())
                .collect(),
            threshold: config.threshold,
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let words = tokens(text);
        self.terms.iter().any(|term| {
            let term_text = term.join(" ");
            words.windows(term.len()).any(|run| {
                strsim::jaro_winkler(&run.join(" "), &term_text) >= self.threshold
            })
        })
    }

    /// Rows with no text are dropped along with non-matching ones
    pub fn apply(&self, table: &mut Table, text_column: &str) {
        let before = table.len();
        table.retain(|row| row.get(text_column).is_some_and(|text| self.matches(text)));
        tracing::debug!(
            kept = table.len(),
            dropped = before - table.len(),
            "Fuzzy term filter applied"
        );
    }
}

/// Adds a `<name>_count` column per configured pattern
#[derive(Debug, Clone)]
pub struct TermCounter {
    patterns: Vec<(String, Regex)>,
}

impl TermCounter {
    /// # Errors
    ///
    /// Returns a configuration error if a pattern does not compile.
    pub fn new(configs: &[TermCountConfig]) -> Result<Self> {
        let patterns = configs
            .iter()
            .map(|c| {
                Regex::new(&c.pattern)
                    .map(|re| (format!("{}_count", c.name), re))
                    .map_err(|e| {
                        SextantError::Configuration(format!(
                            "invalid term count pattern '{}': {e}",
                            c.name
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn apply(&self, table: &mut Table, text_column: &str) {
        for (column, re) in &self.patterns {
            let counts: Vec<usize> = table
                .iter()
                .map(|row| row.get(text_column).map_or(0, |text| re.find_iter(text).count()))
                .collect();
            for (row, count) in counts.into_iter().enumerate() {
                table.set(row, column, Some(count.to_string()));
            }
            table.ensure_column(column);
        }
    }
}

/// The configured set of post-filters
#[derive(Debug, Clone)]
pub struct PostFilters {
    split_notes: bool,
    fuzzy: Option<FuzzyTermFilter>,
    term_counts: TermCounter,
}

impl PostFilters {
    /// # Errors
    ///
    /// Returns a configuration error if a term count pattern is invalid.
    pub fn from_config(config: &BatchConfig) -> Result<Self> {
        Ok(Self {
            split_notes: config.split_notes,
            fuzzy: config.fuzzy.as_ref().map(FuzzyTermFilter::new),
            term_counts: TermCounter::new(&config.term_counts)?,
        })
    }

    /// Filters that do nothing
    pub fn none() -> Self {
        Self {
            split_notes: false,
            fuzzy: None,
            term_counts: TermCounter {
                patterns: Vec::new(),
            },
        }
    }

    /// Run the data type's post-filters in catalogue order
    pub fn apply(&self, data_type: DataType, table: Table) -> Table {
        let spec = data_type.spec();
        let Some(text_column) = spec.text_column else {
            return table;
        };

        let mut table = table;
        for kind in spec.post_filters {
            match kind {
                PostFilterKind::NoteSplitter if self.split_notes => {
                    table = split_notes(
                        &table,
                        text_column,
                        spec.timestamp_column,
                        spec.document_id_column,
                    );
                }
                PostFilterKind::FuzzyTerms => {
                    if let Some(ref fuzzy) = self.fuzzy {
                        fuzzy.apply(&mut table, text_column);
                    }
                }
                PostFilterKind::TermCounts if !self.term_counts.is_empty() => {
                    self.term_counts.apply(&mut table, text_column);
                }
                _ => {}
            }
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn texts(values: &[Option<&str>]) -> Table {
        let mut table = Table::new(["client_idcode", "textualObs"]);
        for (i, v) in values.iter().enumerate() {
            table
                .push_row(vec![Some(format!("P{i}")), v.map(String::from)])
                .unwrap();
        }
        table
    }

    fn fuzzy(terms: &[&str], threshold: f64) -> FuzzyTermFilter {
        FuzzyTermFilter::new(&FuzzyFilterConfig {
            terms: terms.iter().map(|t| t.to_string()).collect(),
            threshold,
        })
    }

    #[test_case("Patient reports dyspnoea on exertion", true; "exact token")]
    #[test_case("Patient reports dyspnea on exertion", true; "spelling variant")]
    #[test_case("No complaints today", false; "unrelated")]
    #[test_case("SHORT OF BREATH overnight", true; "multi word term")]
    fn test_fuzzy_matches(text: &str, expected: bool) {
        let filter = fuzzy(&["dyspnoea", "short of breath"], 0.9);
        assert_eq!(filter.matches(text), expected);
    }

    #[test]
    fn test_fuzzy_apply_drops_null_text() {
        let mut table = texts(&[Some("dyspnoea"), None, Some("fine")]);
        fuzzy(&["dyspnoea"], 0.9).apply(&mut table, "textualObs");
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, "client_idcode"), Some("P0"));
    }

    #[test]
    fn test_term_counts() {
        let counter = TermCounter::new(&[TermCountConfig {
            name: "chest_pain".to_string(),
            pattern: r"(?i)chest pain".to_string(),
        }])
        .unwrap();
        let mut table = texts(&[Some("Chest pain, then chest pain again"), None]);
        counter.apply(&mut table, "textualObs");
        assert_eq!(table.value(0, "chest_pain_count"), Some("2"));
        assert_eq!(table.value(1, "chest_pain_count"), Some("0"));
    }

    #[test]
    fn test_term_counts_on_empty_table_adds_column() {
        let counter = TermCounter::new(&[TermCountConfig {
            name: "af".to_string(),
            pattern: "AF".to_string(),
        }])
        .unwrap();
        let mut table = texts(&[]);
        counter.apply(&mut table, "textualObs");
        assert!(table.has_column("af_count"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = TermCounter::new(&[TermCountConfig {
            name: "bad".to_string(),
            pattern: "(".to_string(),
        }])
        .unwrap_err();
        assert!(matches!(err, SextantError::Configuration(_)));
    }

    #[test]
    fn test_types_without_text_pass_through() {
        let filters = PostFilters::from_config(&BatchConfig {
            fuzzy: Some(FuzzyFilterConfig {
                terms: vec!["x".to_string()],
                threshold: 1.0,
            }),
            ..BatchConfig::default()
        })
        .unwrap();
        let table = texts(&[Some("anything")]);
        assert_eq!(filters.apply(DataType::Bloods, table.clone()).len(), 1);
    }
}
