//! Storage backend factory
//!
//! The backend is chosen once from configuration; everything downstream holds
//! an `Arc<dyn Storage>` and never looks at the flag again.

use super::local::LocalStorage;
use super::traits::Storage;
use crate::config::schema::{StorageBackend, StorageConfig};
use crate::domain::{Result, SextantError, StorageError};
use std::sync::Arc;

/// Create the storage backend named by `config.backend`
///
/// # Errors
///
/// Returns an error if the remote section is missing, or if the remote
/// backend is requested from a build without the `sftp` feature.
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config.backend {
        StorageBackend::Local => {
            tracing::info!(root = %config.root_path, "Using local storage");
            Ok(Arc::new(LocalStorage::new(&config.root_path)))
        }
        StorageBackend::Remote => {
            let remote = config.remote.as_ref().ok_or_else(|| {
                SextantError::Configuration(
                    "storage.remote configuration is required when backend = 'remote'".to_string(),
                )
            })?;
            create_remote(config, remote)
        }
    }
}

#[cfg(feature = "sftp")]
fn create_remote(
    config: &StorageConfig,
    remote: &crate::config::RemoteStorageConfig,
) -> Result<Arc<dyn Storage>> {
    use super::remote::{ConnectionPolicy, RemoteStorage};
    use super::sftp::SftpConnector;

    let policy = ConnectionPolicy::from_share_flag(remote.share_connection);
    tracing::info!(
        host = %remote.host,
        root = %config.root_path,
        policy = ?policy,
        "Using remote storage"
    );
    Ok(Arc::new(RemoteStorage::new(
        &config.root_path,
        Box::new(SftpConnector::from_config(remote)),
        policy,
    )))
}

#[cfg(not(feature = "sftp"))]
fn create_remote(
    _config: &StorageConfig,
    remote: &crate::config::RemoteStorageConfig,
) -> Result<Arc<dyn Storage>> {
    Err(StorageError::Unsupported(format!(
        "remote storage at {} requires building with the `sftp` feature",
        remote.host
    ))
    .into())
}
