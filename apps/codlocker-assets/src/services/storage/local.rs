//! Local filesystem storage implementation.
//!
//! Serves assets from a directory on the local filesystem.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{is_within, normalize_relative, Storage, StorageError};

/// Local filesystem storage rooted at a fixed directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Creates a new local storage serving files under `root`.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Validates that a path is safe and doesn't escape the storage root.
    ///
    /// Traversal segments are rejected lexically before touching the
    /// filesystem. The joined path and the root are then canonicalized so
    /// symlinks pointing outside the root are caught as well.
    ///
    /// Returns the canonical path if safe.
    async fn validate_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = normalize_relative(path)?;
        let candidate = self.root.join(&relative);

        let canonical_root = tokio::fs::canonicalize(&self.root).await.map_err(|e| {
            StorageError::Io(format!(
                "failed to resolve storage root {:?}: {}",
                self.root, e
            ))
        })?;
        let resolved = tokio::fs::canonicalize(&candidate).await?;

        if !is_within(&resolved, &canonical_root) {
            return Err(StorageError::InvalidPath);
        }

        Ok(resolved)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn kind(&self) -> &str {
        "local"
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.validate_path(path).await?;

        let metadata = tokio::fs::metadata(&full_path).await?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound);
        }

        let data = tokio::fs::read(&full_path).await?;
        tracing::trace!(path = ?full_path, bytes = data.len(), "Asset read");
        Ok(data)
    }

    async fn exists(&self, path: &str) -> bool {
        let Ok(full_path) = self.validate_path(path).await else {
            return false;
        };

        match tokio::fs::metadata(&full_path).await {
            Ok(metadata) => metadata.is_file(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, LocalStorage) {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path().to_path_buf());
        (temp, storage)
    }

    #[tokio::test]
    async fn test_local_storage_kind() {
        let (_temp, storage) = create_test_storage();
        assert_eq!(storage.kind(), "local");
    }

    #[tokio::test]
    async fn test_get_nested_file() {
        let (temp, storage) = create_test_storage();
        let bytes: Vec<u8> = vec![0x00, 0xff, 0x10, 0x42, 0x7f];
        fs::create_dir_all(temp.path().join("sub/dir")).unwrap();
        fs::write(temp.path().join("sub/dir/file.bin"), &bytes).unwrap();

        let data = storage.get("sub/dir/file.bin").await.unwrap();
        assert_eq!(data, bytes);
    }

    #[tokio::test]
    async fn test_get_with_leading_slash() {
        let (temp, storage) = create_test_storage();
        fs::write(temp.path().join("logo.png"), "png").unwrap();

        assert_eq!(storage.get("/logo.png").await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn test_get_missing_file() {
        let (_temp, storage) = create_test_storage();

        assert_eq!(
            storage.get("missing.png").await,
            Err(StorageError::NotFound)
        );
        assert!(!storage.exists("missing.png").await);
    }

    #[tokio::test]
    async fn test_get_directory_is_not_found() {
        let (temp, storage) = create_test_storage();
        fs::create_dir_all(temp.path().join("icons")).unwrap();

        assert_eq!(storage.get("icons").await, Err(StorageError::NotFound));
        assert_eq!(storage.get("").await, Err(StorageError::NotFound));
        assert!(!storage.exists("icons").await);
    }

    #[tokio::test]
    async fn test_get_below_a_file_is_not_found() {
        let (temp, storage) = create_test_storage();
        fs::write(temp.path().join("logo.png"), "png").unwrap();

        assert_eq!(
            storage.get("logo.png/inner").await,
            Err(StorageError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_exists() {
        let (temp, storage) = create_test_storage();
        fs::write(temp.path().join("test.txt"), "content").unwrap();

        assert!(storage.exists("test.txt").await);
        assert!(!storage.exists("nonexistent.txt").await);
    }

    #[tokio::test]
    async fn test_path_traversal_prevention() {
        let (_temp, storage) = create_test_storage();

        assert_eq!(
            storage.get("../../etc/passwd").await,
            Err(StorageError::InvalidPath)
        );
        assert_eq!(
            storage.get("foo/../../bar").await,
            Err(StorageError::InvalidPath)
        );
    }

    #[tokio::test]
    async fn test_path_traversal_in_exists() {
        let (_temp, storage) = create_test_storage();

        // Should return false for path traversal attempts (doesn't expose error)
        assert!(!storage.exists("../escape").await);
        assert!(!storage.exists("../../etc/passwd").await);
    }

    #[tokio::test]
    async fn test_traversal_rejected_even_when_target_exists() {
        let parent = TempDir::new().unwrap();
        let root = parent.path().join("assets");
        fs::create_dir_all(&root).unwrap();
        fs::write(parent.path().join("secret.txt"), "secret").unwrap();
        let storage = LocalStorage::new(root);

        assert_eq!(
            storage.get("../secret.txt").await,
            Err(StorageError::InvalidPath)
        );
    }

    #[tokio::test]
    async fn test_inner_parent_segments_fold() {
        let (temp, storage) = create_test_storage();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::write(temp.path().join("b.txt"), "b").unwrap();

        assert_eq!(storage.get("a/../b.txt").await.unwrap(), b"b");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_symlink_escape_prevention() {
        let (temp, storage) = create_test_storage();

        // Create a symlink pointing outside the root
        let external_dir = TempDir::new().unwrap();
        fs::write(external_dir.path().join("external.txt"), "external content").unwrap();
        std::os::unix::fs::symlink(external_dir.path(), temp.path().join("escape_link")).unwrap();

        assert_eq!(
            storage.get("escape_link/external.txt").await,
            Err(StorageError::InvalidPath)
        );
        assert!(!storage.exists("escape_link/external.txt").await);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_sibling_with_shared_prefix_is_rejected() {
        let parent = TempDir::new().unwrap();
        let root = parent.path().join("assets");
        let evil = parent.path().join("assets-evil");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&evil).unwrap();
        fs::write(evil.join("file"), "evil").unwrap();
        std::os::unix::fs::symlink(&evil, root.join("link")).unwrap();
        let storage = LocalStorage::new(root);

        assert_eq!(
            storage.get("link/file").await,
            Err(StorageError::InvalidPath)
        );
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_symlink_inside_root_is_allowed() {
        let (temp, storage) = create_test_storage();
        fs::create_dir_all(temp.path().join("real")).unwrap();
        fs::write(temp.path().join("real/a.txt"), "a").unwrap();
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("alias")).unwrap();

        assert_eq!(storage.get("alias/a.txt").await.unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_missing_root_is_io_error() {
        let storage = LocalStorage::new(PathBuf::from("/nonexistent/asset/root"));

        assert!(matches!(
            storage.get("logo.png").await,
            Err(StorageError::Io(_))
        ));
        assert!(!storage.exists("logo.png").await);
    }
}
