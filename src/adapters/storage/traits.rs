//! Storage abstraction traits
//!
//! Every component reads and writes through [`Storage`], so none of them branch
//! on whether the cache lives on local disk or on a remote host. Paths are
//! relative to the backend's root; absolute paths are used as given.

use crate::domain::{Result, Table};
use std::path::{Path, PathBuf};

/// Uniform file operations over a local or remote filesystem
pub trait Storage: Send + Sync {
    /// Short description for logs, e.g. `local:/data` or `sftp://host/data`
    fn describe(&self) -> String;

    /// Whether a file or directory exists at `path`
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Entry names (not full paths) directly under `path`, sorted
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Whole-file read
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;

    /// Whole-file write that never leaves a partial file at `path`
    ///
    /// Parent directories are created as needed. Data is written to a temporary
    /// sibling first and moved into place in one rename.
    fn write_bytes(&self, path: &Path, data: &[u8]) -> Result<()>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Every regular file below `root`, recursively, sorted, relative to the backend root
    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Read a CSV file into a [`Table`]
    fn read_table(&self, path: &Path) -> Result<Table> {
        Table::from_csv_bytes(&self.read_bytes(path)?)
    }

    /// Write a [`Table`] as CSV, atomically
    fn write_table(&self, path: &Path, table: &Table) -> Result<()> {
        self.write_bytes(path, &table.to_csv_bytes()?)
    }
}
