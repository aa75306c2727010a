//! Index-event resolution across annotation sources
//!
//! Each enabled source contributes at most one candidate row: the earliest or
//! latest qualifying annotation in that source. The candidates are then
//! compared on a common `updatetime` column and the overall winner becomes the
//! patient's index event. When nothing qualifies a fallback row anchored on the
//! patient's window is produced instead.

use super::filter::AnnotationFilter;
use crate::adapters::storage::Storage;
use crate::config::IndexConfig;
use crate::core::annotate::annotation_path;
use crate::core::window::{format_timestamp, parse_datetime};
use crate::domain::{
    AnnotationSource, Cell, PatientId, ResolveMode, Result, RowRef, Table, TimeWindow,
    PATIENT_ID_COLUMN,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Timestamp column every candidate is normalised to
pub const CANONICAL_TIMESTAMP: &str = "updatetime";

/// Column naming the source a record came from
pub const SOURCE_COLUMN: &str = "source";

/// Source name of synthesised records
pub const FALLBACK_SOURCE: &str = "fallback";

/// What qualifies as an index event
#[derive(Debug, Clone, Default)]
pub struct IndexQuery {
    /// Allowed concept ids; empty allows every concept
    pub filter_codes: HashSet<String>,
    pub filter: Option<AnnotationFilter>,
    pub mode: ResolveMode,
    /// Searched in this order, which is also the tie-break order
    pub sources: Vec<AnnotationSource>,
}

impl IndexQuery {
    pub fn from_config(config: &IndexConfig) -> Self {
        let filter = AnnotationFilter::from_config(&config.filter);
        Self {
            filter_codes: config.filter_codes.iter().cloned().collect(),
            filter: (!filter.is_empty()).then_some(filter),
            mode: config.mode,
            sources: config.sources.clone(),
        }
    }
}

/// The resolved index event for one patient
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEventRecord {
    pub patient_id: PatientId,
    /// Source name, or [`FALLBACK_SOURCE`]
    pub source: String,
    /// Column values, including `updatetime` and `source`
    pub values: BTreeMap<String, Cell>,
}

impl IndexEventRecord {
    pub fn is_fallback(&self) -> bool {
        self.source == FALLBACK_SOURCE
    }

    pub fn updatetime(&self) -> Option<&str> {
        self.values.get(CANONICAL_TIMESTAMP).and_then(|v| v.as_deref())
    }
}

struct Candidate {
    source: AnnotationSource,
    at: DateTime<Utc>,
    values: BTreeMap<String, Cell>,
}

/// `true` when `candidate` should replace `current` under `mode`
///
/// Strict comparison, so on equal timestamps the earlier-seen row is kept.
fn beats(mode: ResolveMode, candidate: &DateTime<Utc>, current: &DateTime<Utc>) -> bool {
    match mode {
        ResolveMode::Earliest => candidate < current,
        ResolveMode::Latest => candidate > current,
    }
}

fn best_row<'a>(table: &'a Table, ts_column: &str, mode: ResolveMode) -> Option<(RowRef<'a>, DateTime<Utc>)> {
    let mut best: Option<(RowRef<'a>, DateTime<Utc>)> = None;
    for row in table.iter() {
        let Some(at) = row.get(ts_column).and_then(parse_datetime) else {
            continue;
        };
        match best {
            Some((_, ref current)) if !beats(mode, &at, current) => {}
            _ => best = Some((row, at)),
        }
    }
    best
}

/// Resolves index events from persisted annotation files
pub struct RecordResolver {
    storage: Arc<dyn Storage>,
    query: IndexQuery,
}

impl RecordResolver {
    pub fn new(storage: Arc<dyn Storage>, query: IndexQuery) -> Self {
        Self { storage, query }
    }

    pub fn query(&self) -> &IndexQuery {
        &self.query
    }

    /// Resolve one patient's index event
    ///
    /// `window` and `lookback` only matter for the fallback, which is dated at
    /// the window start, or the window end for lookback runs.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing annotation file cannot be read.
    pub fn resolve_index_event(
        &self,
        patient_id: &PatientId,
        window: &TimeWindow,
        lookback: bool,
    ) -> Result<IndexEventRecord> {
        let mut best: Option<Candidate> = None;

        for &source in &self.query.sources {
            let Some(candidate) = self.source_candidate(patient_id, source)? else {
                continue;
            };
            match best {
                Some(ref current) if !beats(self.query.mode, &candidate.at, &current.at) => {}
                _ => best = Some(candidate),
            }
        }

        match best {
            Some(winner) => {
                tracing::debug!(
                    patient_id = %patient_id,
                    source = %winner.source,
                    updatetime = %format_timestamp(&winner.at),
                    mode = %self.query.mode,
                    "Index event resolved"
                );
                Ok(IndexEventRecord {
                    patient_id: patient_id.clone(),
                    source: winner.source.name().to_string(),
                    values: winner.values,
                })
            }
            None => {
                tracing::debug!(patient_id = %patient_id, "No qualifying record, using fallback");
                Ok(self.fallback(patient_id, window, lookback))
            }
        }
    }

    /// Synthesised record dated at the window boundary
    pub fn fallback(&self, patient_id: &PatientId, window: &TimeWindow, lookback: bool) -> IndexEventRecord {
        let at = if lookback { window.end() } else { window.start() };

        let mut values: BTreeMap<String, Cell> = BTreeMap::new();
        for source in &self.query.sources {
            for column in source.mandatory_columns() {
                if column != source.timestamp_column() {
                    values.insert(column.to_string(), None);
                }
            }
        }
        values.insert(PATIENT_ID_COLUMN.to_string(), Some(patient_id.to_string()));
        values.insert(CANONICAL_TIMESTAMP.to_string(), Some(format_timestamp(&at)));
        values.insert(SOURCE_COLUMN.to_string(), Some(FALLBACK_SOURCE.to_string()));

        IndexEventRecord {
            patient_id: patient_id.clone(),
            source: FALLBACK_SOURCE.to_string(),
            values,
        }
    }

    fn source_candidate(
        &self,
        patient_id: &PatientId,
        source: AnnotationSource,
    ) -> Result<Option<Candidate>> {
        let path = annotation_path(patient_id, source);
        if !self.storage.exists(&path)? {
            return Ok(None);
        }

        let mut table = self.storage.read_table(&path)?;
        let mandatory = source.mandatory_columns();
        for column in &mandatory {
            if !table.has_column(column) {
                tracing::debug!(
                    patient_id = %patient_id,
                    source = %source,
                    column = %column,
                    "Mandatory column missing, filled with nulls"
                );
                table.ensure_column(column);
            }
        }
        table.drop_nulls(&source.identity_columns());
        if table.is_empty() {
            return Ok(None);
        }

        if let Some(ref filter) = self.query.filter {
            table.retain(|row| filter.matches(&row));
        }
        if !self.query.filter_codes.is_empty() {
            table.retain(|row| {
                row.get("cui")
                    .is_some_and(|cui| self.query.filter_codes.contains(cui))
            });
        }

        let ts_column = source.timestamp_column();
        let Some((row, at)) = best_row(&table, ts_column, self.query.mode) else {
            return Ok(None);
        };

        let mut values = row.to_record();
        if let Some(ts) = values.remove(ts_column) {
            values.insert(CANONICAL_TIMESTAMP.to_string(), ts);
        }
        values.insert(SOURCE_COLUMN.to_string(), Some(source.name().to_string()));

        Ok(Some(Candidate { source, at, values }))
    }
}
