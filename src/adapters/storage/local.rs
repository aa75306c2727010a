//! Local filesystem backend

use super::traits::Storage;
use crate::domain::{Result, StorageError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// [`Storage`] over a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

impl Storage for LocalStorage {
    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve(path).exists())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let full = self.resolve(path);
        let entries = fs::read_dir(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(display(&full))
            } else {
                StorageError::ListFailed {
                    path: display(&full),
                    message: e.to_string(),
                }
            }
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::ListFailed {
                path: display(&full),
                message: e.to_string(),
            })?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        fs::read(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(display(&full)).into()
            } else {
                StorageError::ReadFailed {
                    path: display(&full),
                    message: e.to_string(),
                }
                .into()
            }
        })
    }

    fn write_bytes(&self, path: &Path, data: &[u8]) -> Result<()> {
        let full = self.resolve(path);
        let write_failed = |message: String| StorageError::WriteFailed {
            path: display(&full),
            message,
        };

        let parent = match full.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| write_failed(e.to_string()))?;

        // Same directory as the target so the final rename never crosses filesystems
        let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| write_failed(e.to_string()))?;
        tmp.write_all(data).map_err(|e| write_failed(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| write_failed(e.to_string()))?;
        tmp.persist(&full)
            .map_err(|e| write_failed(e.error.to_string()))?;
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        fs::create_dir_all(&full).map_err(|e| {
            StorageError::WriteFailed {
                path: display(&full),
                message: e.to_string(),
            }
            .into()
        })
    }

    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let full = self.resolve(root);
        if !full.exists() {
            return Err(StorageError::NotFound(display(&full)).into());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&full).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %full.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            files.push(relative.to_path_buf());
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SextantError, Table};
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_creates_parents() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let path = Path::new("a/b/c.csv");

        assert!(!storage.exists(path).unwrap());
        storage.write_bytes(path, b"x\n1\n").unwrap();
        assert!(storage.exists(path).unwrap());
        assert_eq!(storage.read_bytes(path).unwrap(), b"x\n1\n");
    }

    #[test]
    fn test_write_overwrites_in_full() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let path = Path::new("f.csv");

        storage.write_bytes(path, b"long content here").unwrap();
        storage.write_bytes(path, b"short").unwrap();
        assert_eq!(storage.read_bytes(path).unwrap(), b"short");
        // No temporary files left behind
        assert_eq!(storage.list_dir(Path::new("")).unwrap(), vec!["f.csv"]);
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let err = storage.read_bytes(Path::new("nope.csv")).unwrap_err();
        assert!(matches!(err, SextantError::Storage(StorageError::NotFound(_))));
    }

    #[test]
    fn test_list_dir_sorted() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        for name in ["b.csv", "a.csv", "c.csv"] {
            storage.write_bytes(&Path::new("d").join(name), b"").unwrap();
        }
        assert_eq!(
            storage.list_dir(Path::new("d")).unwrap(),
            vec!["a.csv", "b.csv", "c.csv"]
        );
    }

    #[test]
    fn test_walk_files_recursive_and_relative() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.write_bytes(Path::new("in/x.csv"), b"").unwrap();
        storage.write_bytes(Path::new("in/deep/y.csv"), b"").unwrap();
        storage.create_dir_all(Path::new("in/empty")).unwrap();

        let files = storage.walk_files(Path::new("in")).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("in/deep/y.csv"), PathBuf::from("in/x.csv")]
        );
        // Walked paths are readable as-is
        assert!(storage.read_bytes(&files[0]).is_ok());
    }

    #[test]
    fn test_walk_missing_root() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.walk_files(Path::new("missing")).is_err());
    }

    #[test]
    fn test_table_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let mut table = Table::new(vec!["client_idcode".to_string(), "value".to_string()]);
        table
            .push_row(vec![Some("P1".to_string()), None])
            .unwrap();

        storage.write_table(Path::new("t.csv"), &table).unwrap();
        assert_eq!(storage.read_table(Path::new("t.csv")).unwrap(), table);
    }
}
