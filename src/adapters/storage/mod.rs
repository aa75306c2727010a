//! Storage abstraction
//!
//! Existence, listing, read and atomic write over either the local filesystem
//! or a remote one, behind the [`Storage`] trait.

pub mod factory;
pub mod local;
pub mod remote;
#[cfg(feature = "sftp")]
pub mod sftp;
pub mod traits;

pub use factory::create_storage;
pub use local::LocalStorage;
pub use remote::{ConnectionPolicy, RemoteSession, RemoteStorage, SessionConnector};
pub use traits::Storage;
