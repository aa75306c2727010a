//! Remote filesystem backend
//!
//! [`RemoteStorage`] drives any [`RemoteSession`] (SFTP in production, an
//! in-memory fake in tests). With [`ConnectionPolicy::Shared`] one session is
//! opened lazily and reused for every call; with [`ConnectionPolicy::PerCall`]
//! each operation opens and drops its own.

use super::traits::Storage;
use crate::domain::{Result, SextantError, StorageError};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One open connection to a remote filesystem
pub trait RemoteSession: Send {
    fn exists(&mut self, path: &Path) -> Result<bool>;

    /// Entries directly under `path` as `(full path, is_dir)`
    fn read_dir(&mut self, path: &Path) -> Result<Vec<(PathBuf, bool)>>;

    fn read_file(&mut self, path: &Path) -> Result<Vec<u8>>;

    /// Create or truncate `path` and write `data`
    fn write_file(&mut self, path: &Path, data: &[u8]) -> Result<()>;

    /// Rename, replacing `to` if it exists
    fn rename(&mut self, from: &Path, to: &Path) -> Result<()>;

    /// Create a single directory
    fn mkdir(&mut self, path: &Path) -> Result<()>;

    fn remove_file(&mut self, path: &Path) -> Result<()>;
}

/// Opens new [`RemoteSession`]s
pub trait SessionConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn RemoteSession>>;

    /// e.g. `sftp://user@host:22`
    fn describe(&self) -> String;
}

/// Whether operations share one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPolicy {
    Shared,
    PerCall,
}

impl ConnectionPolicy {
    pub fn from_share_flag(share_connection: bool) -> Self {
        if share_connection {
            ConnectionPolicy::Shared
        } else {
            ConnectionPolicy::PerCall
        }
    }
}

/// [`Storage`] over a remote filesystem
pub struct RemoteStorage {
    root: PathBuf,
    connector: Box<dyn SessionConnector>,
    policy: ConnectionPolicy,
    shared: Mutex<Option<Box<dyn RemoteSession>>>,
}

impl RemoteStorage {
    pub fn new(
        root: impl Into<PathBuf>,
        connector: Box<dyn SessionConnector>,
        policy: ConnectionPolicy,
    ) -> Self {
        Self {
            root: root.into(),
            connector,
            policy,
            shared: Mutex::new(None),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn with_session<T>(&self, op: impl FnOnce(&mut dyn RemoteSession) -> Result<T>) -> Result<T> {
        match self.policy {
            ConnectionPolicy::PerCall => {
                let mut session = self.connector.connect()?;
                op(session.as_mut())
            }
            ConnectionPolicy::Shared => {
                let mut guard = self.shared.lock().map_err(|_| {
                    StorageError::ConnectionFailed("shared session lock poisoned".to_string())
                })?;
                if guard.is_none() {
                    tracing::debug!(remote = %self.connector.describe(), "Opening shared session");
                    *guard = Some(self.connector.connect()?);
                }
                let session = match guard.as_mut() {
                    Some(session) => session,
                    None => {
                        return Err(StorageError::ConnectionFailed(
                            "shared session unavailable".to_string(),
                        )
                        .into())
                    }
                };
                let result = op(session.as_mut());
                // A dropped connection is reopened on the next call
                if let Err(SextantError::Storage(StorageError::ConnectionFailed(_))) = &result {
                    *guard = None;
                }
                result
            }
        }
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }
}

fn ensure_dirs(session: &mut dyn RemoteSession, dir: &Path) -> Result<()> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(d) = current {
        if d.as_os_str().is_empty() || session.exists(d)? {
            break;
        }
        missing.push(d.to_path_buf());
        current = d.parent();
    }
    for d in missing.iter().rev() {
        session.mkdir(d)?;
    }
    Ok(())
}

impl Storage for RemoteStorage {
    fn describe(&self) -> String {
        format!("{}{}", self.connector.describe(), self.root.display())
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        let full = self.resolve(path);
        self.with_session(|s| s.exists(&full))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let full = self.resolve(path);
        let entries = self.with_session(|s| s.read_dir(&full))?;
        let mut names: Vec<String> = entries
            .iter()
            .filter_map(|(p, _)| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        self.with_session(|s| s.read_file(&full))
    }

    fn write_bytes(&self, path: &Path, data: &[u8]) -> Result<()> {
        let full = self.resolve(path);
        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::WriteFailed {
                path: full.display().to_string(),
                message: "path has no file name".to_string(),
            })?;
        let tmp = full.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        self.with_session(|s| {
            if let Some(parent) = full.parent() {
                ensure_dirs(s, parent)?;
            }
            let written = s.write_file(&tmp, data).and_then(|()| s.rename(&tmp, &full));
            if written.is_err() {
                if let Err(e) = s.remove_file(&tmp) {
                    tracing::debug!(path = %tmp.display(), error = %e, "Temporary file not removed");
                }
            }
            written
        })
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        self.with_session(|s| ensure_dirs(s, &full))
    }

    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let full = self.resolve(root);
        let mut files = self.with_session(|s| {
            if !s.exists(&full)? {
                return Err(StorageError::NotFound(full.display().to_string()).into());
            }
            let mut files = Vec::new();
            let mut pending = vec![full.clone()];
            while let Some(dir) = pending.pop() {
                for (path, is_dir) in s.read_dir(&dir)? {
                    if is_dir {
                        pending.push(path);
                    } else {
                        files.push(path);
                    }
                }
            }
            Ok(files)
        })?;
        files = files.iter().map(|p| self.relative(p)).collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    pub(crate) struct MemoryFs {
        pub files: BTreeMap<PathBuf, Vec<u8>>,
        pub dirs: BTreeSet<PathBuf>,
        pub fail_renames: bool,
    }

    pub(crate) struct MemorySession {
        fs: Arc<Mutex<MemoryFs>>,
    }

    impl RemoteSession for MemorySession {
        fn exists(&mut self, path: &Path) -> Result<bool> {
            let fs = self.fs.lock().unwrap();
            Ok(path == Path::new("/") || fs.files.contains_key(path) || fs.dirs.contains(path))
        }

        fn read_dir(&mut self, path: &Path) -> Result<Vec<(PathBuf, bool)>> {
            let fs = self.fs.lock().unwrap();
            let mut out: Vec<(PathBuf, bool)> = fs
                .files
                .keys()
                .filter(|p| p.parent() == Some(path))
                .map(|p| (p.clone(), false))
                .collect();
            out.extend(
                fs.dirs
                    .iter()
                    .filter(|p| p.parent() == Some(path))
                    .map(|p| (p.clone(), true)),
            );
            Ok(out)
        }

        fn read_file(&mut self, path: &Path) -> Result<Vec<u8>> {
            let fs = self.fs.lock().unwrap();
            fs.files
                .get(path)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(path.display().to_string()).into())
        }

        fn write_file(&mut self, path: &Path, data: &[u8]) -> Result<()> {
            let mut fs = self.fs.lock().unwrap();
            let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
            if parent != Path::new("/") && !fs.dirs.contains(&parent) {
                return Err(StorageError::WriteFailed {
                    path: path.display().to_string(),
                    message: "no such directory".to_string(),
                }
                .into());
            }
            fs.files.insert(path.to_path_buf(), data.to_vec());
            Ok(())
        }

        fn rename(&mut self, from: &Path, to: &Path) -> Result<()> {
            let mut fs = self.fs.lock().unwrap();
            if fs.fail_renames {
                return Err(StorageError::WriteFailed {
                    path: to.display().to_string(),
                    message: "permission denied".to_string(),
                }
                .into());
            }
            let data = fs
                .files
                .remove(from)
                .ok_or_else(|| StorageError::NotFound(from.display().to_string()))?;
            fs.files.insert(to.to_path_buf(), data);
            Ok(())
        }

        fn mkdir(&mut self, path: &Path) -> Result<()> {
            self.fs.lock().unwrap().dirs.insert(path.to_path_buf());
            Ok(())
        }

        fn remove_file(&mut self, path: &Path) -> Result<()> {
            self.fs
                .lock()
                .unwrap()
                .files
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| StorageError::NotFound(path.display().to_string()).into())
        }
    }

    #[derive(Default)]
    pub(crate) struct MemoryConnector {
        pub fs: Arc<Mutex<MemoryFs>>,
        pub connects: Arc<AtomicUsize>,
    }

    impl SessionConnector for MemoryConnector {
        fn connect(&self) -> Result<Box<dyn RemoteSession>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MemorySession {
                fs: Arc::clone(&self.fs),
            }))
        }

        fn describe(&self) -> String {
            "memory://".to_string()
        }
    }

    fn storage(policy: ConnectionPolicy) -> (RemoteStorage, Arc<AtomicUsize>, Arc<Mutex<MemoryFs>>) {
        let connector = MemoryConnector::default();
        let connects = Arc::clone(&connector.connects);
        let fs = Arc::clone(&connector.fs);
        (
            RemoteStorage::new("/data", Box::new(connector), policy),
            connects,
            fs,
        )
    }

    #[test]
    fn test_shared_policy_connects_once() {
        let (storage, connects, _) = storage(ConnectionPolicy::Shared);
        storage.write_bytes(Path::new("a/x.csv"), b"1").unwrap();
        storage.read_bytes(Path::new("a/x.csv")).unwrap();
        storage.exists(Path::new("a/x.csv")).unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_per_call_policy_connects_every_time() {
        let (storage, connects, _) = storage(ConnectionPolicy::PerCall);
        storage.write_bytes(Path::new("a/x.csv"), b"1").unwrap();
        storage.read_bytes(Path::new("a/x.csv")).unwrap();
        storage.exists(Path::new("a/x.csv")).unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_write_goes_through_temp_file() {
        let (storage, _, fs) = storage(ConnectionPolicy::Shared);
        storage.write_bytes(Path::new("p/V1.csv"), b"old").unwrap();
        storage.write_bytes(Path::new("p/V1.csv"), b"new").unwrap();

        let fs = fs.lock().unwrap();
        let names: Vec<&PathBuf> = fs.files.keys().collect();
        assert_eq!(names, vec![&PathBuf::from("/data/p/V1.csv")]);
        assert_eq!(fs.files[&PathBuf::from("/data/p/V1.csv")], b"new");
        assert!(fs.dirs.contains(Path::new("/data")));
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let (storage, _, fs) = storage(ConnectionPolicy::Shared);
        storage.write_bytes(Path::new("p/V1.csv"), b"old").unwrap();
        fs.lock().unwrap().fail_renames = true;

        assert!(storage.write_bytes(Path::new("p/V1.csv"), b"new").is_err());

        let fs = fs.lock().unwrap();
        let names: Vec<&PathBuf> = fs.files.keys().collect();
        assert_eq!(names, vec![&PathBuf::from("/data/p/V1.csv")]);
        assert_eq!(fs.files[&PathBuf::from("/data/p/V1.csv")], b"old");
    }

    #[test]
    fn test_failed_write_reports_original_error() {
        let (storage, _, fs) = storage(ConnectionPolicy::Shared);
        fs.lock().unwrap().fail_renames = true;

        let err = storage.write_bytes(Path::new("q/V2.csv"), b"x").unwrap_err();
        assert!(matches!(err, SextantError::Storage(StorageError::WriteFailed { .. })));
        assert!(fs.lock().unwrap().files.is_empty());
    }

    #[test]
    fn test_list_and_walk() {
        let (storage, _, _) = storage(ConnectionPolicy::Shared);
        storage.write_bytes(Path::new("in/b.csv"), b"").unwrap();
        storage.write_bytes(Path::new("in/sub/a.csv"), b"").unwrap();

        assert_eq!(storage.list_dir(Path::new("in")).unwrap(), vec!["b.csv", "sub"]);
        assert_eq!(
            storage.walk_files(Path::new("in")).unwrap(),
            vec![PathBuf::from("in/b.csv"), PathBuf::from("in/sub/a.csv")]
        );
        assert!(storage.walk_files(Path::new("missing")).is_err());
    }

    #[test]
    fn test_policy_from_flag() {
        assert_eq!(ConnectionPolicy::from_share_flag(true), ConnectionPolicy::Shared);
        assert_eq!(ConnectionPolicy::from_share_flag(false), ConnectionPolicy::PerCall);
    }
}
