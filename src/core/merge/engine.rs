//! Heterogeneous-schema CSV merge
//!
//! Every input file is padded to the union of all observed columns (the
//! manifest) so rows of different shapes can share one output. Inputs are read
//! through [`Storage`]; the output is a local file.

use super::date_decode::decode_date_buckets;
use crate::adapters::storage::Storage;
use crate::config::MergeConfig;
use crate::domain::{Result, SextantError, Table};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one merge run
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub output_path: PathBuf,
    pub files_found: usize,
    pub files_merged: usize,
    pub files_skipped: usize,
    pub rows_written: usize,
    pub columns: Vec<String>,
    pub backup_path: Option<PathBuf>,
    pub duration: Duration,
}

impl MergeReport {
    pub fn log_summary(&self) {
        tracing::info!(
            output = %self.output_path.display(),
            files_found = self.files_found,
            files_merged = self.files_merged,
            files_skipped = self.files_skipped,
            rows = self.rows_written,
            columns = self.columns.len(),
            duration_secs = self.duration.as_secs(),
            "Merge completed"
        );
        if let Some(ref backup) = self.backup_path {
            tracing::info!(backup = %backup.display(), "Previous output backed up");
        }
    }
}

/// Rows of one chunk, already aligned to the manifest
struct ChunkResult {
    rows: Vec<Vec<String>>,
    merged: usize,
    skipped: usize,
}

pub struct MergeEngine {
    storage: Arc<dyn Storage>,
    config: MergeConfig,
}

impl MergeEngine {
    /// # Errors
    ///
    /// Returns a configuration error if the merge settings are invalid.
    pub fn new(storage: Arc<dyn Storage>, config: MergeConfig) -> Result<Self> {
        config.validate().map_err(SextantError::Configuration)?;
        Ok(Self { storage, config })
    }

    /// Merge every CSV under the input directory into the output file
    ///
    /// # Errors
    ///
    /// Returns [`SextantError::NoInputFiles`] when there is nothing to merge,
    /// and an error if the output cannot be written. Unreadable inputs are
    /// logged and skipped.
    pub fn merge_all(&self) -> Result<MergeReport> {
        let started = Instant::now();
        let input_dir = Path::new(&self.config.input_dir);
        let output_path = PathBuf::from(&self.config.output_path);

        let found = self.input_files(input_dir, &output_path)?;
        let files_found = found.len();
        let files = self.sample(found);
        tracing::info!(
            input_dir = %input_dir.display(),
            found = files_found,
            selected = files.len(),
            "Merging files"
        );

        let columns = self.manifest(&files);
        let backup_path = backup_existing(&output_path)?;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_writer(File::create(&output_path)?);
        writer.write_record(&columns)?;

        let mut files_merged = 0;
        let mut files_skipped = 0;
        let mut rows_written = 0;
        let mut write_chunk = |chunk: ChunkResult| -> Result<()> {
            for row in &chunk.rows {
                writer.write_record(row)?;
            }
            files_merged += chunk.merged;
            files_skipped += chunk.skipped;
            rows_written += chunk.rows.len();
            Ok(())
        };

        let chunks: Vec<&[PathBuf]> = files.chunks(self.config.chunk_size).collect();
        if self.config.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.workers)
                .build()
                .map_err(|e| SextantError::Merge(format!("worker pool: {e}")))?;
            // Results are collected per wave in chunk order, not completion order
            for wave in chunks.chunks(self.config.workers) {
                let results: Vec<ChunkResult> = pool.install(|| {
                    wave.par_iter()
                        .map(|chunk| self.process_chunk(chunk, &columns))
                        .collect()
                });
                for result in results {
                    write_chunk(result)?;
                }
            }
        } else {
            for (i, chunk) in chunks.iter().enumerate() {
                write_chunk(self.process_chunk(chunk, &columns))?;
                tracing::debug!(chunk = i + 1, of = chunks.len(), "Chunk merged");
            }
        }
        writer.flush()?;
        drop(writer);

        let mut columns = columns;
        if self.config.decode_date_buckets {
            columns = decode_output(&output_path)?;
        }

        let report = MergeReport {
            output_path,
            files_found,
            files_merged,
            files_skipped,
            rows_written,
            columns,
            backup_path,
            duration: started.elapsed(),
        };
        report.log_summary();
        Ok(report)
    }

    fn input_files(&self, input_dir: &Path, output_path: &Path) -> Result<Vec<PathBuf>> {
        if !self.storage.exists(input_dir)? {
            return Err(SextantError::NoInputFiles(input_dir.to_path_buf()));
        }
        let output_name = output_path.file_name().map(|n| n.to_string_lossy().into_owned());
        let backup_prefix = output_path
            .file_stem()
            .map(|s| format!("{}_backup_", s.to_string_lossy()));

        let files: Vec<PathBuf> = self
            .storage
            .walk_files(input_dir)?
            .into_iter()
            .filter(|p| {
                let is_csv = p
                    .extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
                let name = p.file_name().map(|n| n.to_string_lossy().into_owned());
                let is_output = name.is_some() && name == output_name;
                let is_backup = match (&name, &backup_prefix) {
                    (Some(n), Some(prefix)) => n.starts_with(prefix.as_str()),
                    _ => false,
                };
                is_csv && !is_output && !is_backup
            })
            .collect();

        if files.is_empty() {
            return Err(SextantError::NoInputFiles(input_dir.to_path_buf()));
        }
        Ok(files)
    }

    fn sample(&self, files: Vec<PathBuf>) -> Vec<PathBuf> {
        match self.config.sample_size {
            Some(n) if n < files.len() => {
                let mut picked: Vec<PathBuf> = files
                    .choose_multiple(&mut rand::thread_rng(), n)
                    .cloned()
                    .collect();
                picked.sort();
                picked
            }
            _ => files,
        }
    }

    /// Sorted union of the header rows of `files`
    fn manifest(&self, files: &[PathBuf]) -> Vec<String> {
        let mut columns = BTreeSet::new();
        for path in files {
            match self.read_header(path) {
                Ok(header) => columns.extend(header),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Cannot read header"),
            }
        }
        columns.into_iter().collect()
    }

    fn read_header(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = self.storage.read_bytes(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes.as_slice());
        Ok(reader.headers()?.iter().map(String::from).collect())
    }

    fn process_chunk(&self, chunk: &[PathBuf], columns: &[String]) -> ChunkResult {
        let mut result = ChunkResult {
            rows: Vec::new(),
            merged: 0,
            skipped: 0,
        };
        for path in chunk {
            match self.storage.read_table(path) {
                Ok(table) if table.columns().is_empty() => {
                    tracing::warn!(path = %path.display(), "Empty file skipped");
                    result.skipped += 1;
                }
                Ok(table) => {
                    result.rows.extend(align_rows(&table, columns));
                    result.merged += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Malformed file skipped");
                    result.skipped += 1;
                }
            }
        }
        result
    }
}

fn align_rows(table: &Table, columns: &[String]) -> Vec<Vec<String>> {
    table
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).unwrap_or_default().to_string())
                .collect()
        })
        .collect()
}

/// Move an existing output aside as `<stem>_backup_<timestamp>.<ext>`
fn backup_existing(output_path: &Path) -> Result<Option<PathBuf>> {
    if !output_path.exists() {
        return Ok(None);
    }
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "merged".to_string());
    let ext = output_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let backup = output_path.with_file_name(format!("{stem}_backup_{stamp}.{ext}"));
    fs::rename(output_path, &backup)?;
    tracing::warn!(
        output = %output_path.display(),
        backup = %backup.display(),
        "Existing output moved aside"
    );
    Ok(Some(backup))
}

fn decode_output(output_path: &Path) -> Result<Vec<String>> {
    let mut table = Table::from_csv_reader(File::open(output_path)?)?;
    decode_date_buckets(&mut table);

    let parent = output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    std::io::Write::write_all(&mut tmp, &table.to_csv_bytes()?)?;
    tmp.persist(output_path)
        .map_err(|e| SextantError::Io(e.to_string()))?;
    Ok(table.columns().to_vec())
}
