//! Storage backends for asset bytes.
//!
//! Provides a unified interface for reading assets from different storage
//! backends. Only the local filesystem is implemented; the `bucket` location
//! is accepted so deployments can flip the flag ahead of time, and resolves
//! to local storage until an object-store backend exists.

mod local;

pub use local::LocalStorage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Failure classes for asset lookups.
///
/// The HTTP layer collapses all of these into the same response; the
/// distinction only matters for logging and tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The path escapes the storage root or is malformed.
    #[error("invalid path: outside storage root")]
    InvalidPath,

    /// Nothing readable at a validated path.
    #[error("file not found")]
    NotFound,

    /// Any other filesystem failure.
    #[error("failed to read file: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound | ErrorKind::NotADirectory => StorageError::NotFound,
            _ => StorageError::Io(err.to_string()),
        }
    }
}

/// Trait defining the interface for storage backends.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the backend kind (e.g., "local").
    fn kind(&self) -> &str;

    /// Reads the full contents of the asset at `path`.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Checks whether `path` names a readable asset. Never errors.
    async fn exists(&self, path: &str) -> bool;
}

/// Storage location selected by the `imageStorageLocation` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum StorageLocation {
    #[default]
    Local,
    Bucket,
}

impl StorageLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageLocation::Local => "local",
            StorageLocation::Bucket => "bucket",
        }
    }
}

impl From<&str> for StorageLocation {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "bucket" => StorageLocation::Bucket,
            _ => StorageLocation::Local,
        }
    }
}

impl From<String> for StorageLocation {
    fn from(value: String) -> Self {
        StorageLocation::from(value.as_str())
    }
}

impl std::fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the backend for a request from the current storage location.
#[derive(Clone)]
pub struct StorageSelector {
    local: Arc<LocalStorage>,
}

impl StorageSelector {
    pub fn new(local: LocalStorage) -> Self {
        Self {
            local: Arc::new(local),
        }
    }

    pub fn select(&self, location: StorageLocation) -> Arc<dyn Storage> {
        match location {
            StorageLocation::Bucket => {
                // TODO: object-store backend once bucket credentials are provisioned
                tracing::warn!("bucket storage not yet implemented, falling back to local");
                self.local.clone()
            }
            StorageLocation::Local => self.local.clone(),
        }
    }
}

/// Lexically normalizes a client-supplied asset path into a relative path.
///
/// Empty, `.` and root segments are dropped and `name/..` pairs fold away.
/// A `..` that would climb above the root, a NUL byte, or a platform prefix
/// rejects the whole path.
pub(crate) fn normalize_relative(path: &str) -> Result<PathBuf, StorageError> {
    if path.contains('\0') {
        return Err(StorageError::InvalidPath);
    }

    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(StorageError::InvalidPath);
                }
            }
            Component::Prefix(_) => return Err(StorageError::InvalidPath),
        }
    }

    Ok(parts.into_iter().collect())
}

/// Component-wise containment: `/data/assets-evil` is not inside `/data/assets`.
pub(crate) fn is_within(candidate: &Path, root: &Path) -> bool {
    candidate.starts_with(root)
}
