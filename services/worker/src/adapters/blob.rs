//! services/worker/src/adapters/blob.rs
//!
//! Filesystem-backed blob store for uploaded document bytes. Paths are
//! relative keys under a configured root; anything trying to escape the
//! root is rejected before touching the disk.

use async_trait::async_trait;
use cat_tales_core::ports::{BlobError, BlobStore};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates the store, making sure the root directory exists.
    pub async fn new(root: PathBuf) -> Result<Self, BlobError> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| BlobError::Io(format!("failed to create blob root '{}': {e}", root.display())))?;
        info!(path = %root.display(), "blob store initialized");
        Ok(Self { root })
    }

    /// Resolves a relative key against the root, rejecting traversal.
    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(key);
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(c) => resolved.push(c),
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(BlobError::Io(format!("invalid blob key '{key}'")));
                }
                Component::CurDir => {}
            }
        }
        Ok(resolved)
    }

    /// The canonical storage key for an upload: content-addressed by hash,
    /// sharded by the first two hex characters.
    pub fn key_for_hash(file_hash: &str) -> String {
        let shard = &file_hash[..2.min(file_hash.len())];
        format!("blobs/{shard}/{file_hash}")
    }
}

/// SHA-256 content hash of an upload, as lowercase hex. Used both as the
/// dedup key on documents and as the blob storage key.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        let path = self.resolve(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.resolve(key)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BlobError::NotFound(key.to_string())
            } else {
                BlobError::Io(e.to_string())
            }
        })
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::Io(e.to_string()))?;
        }
        fs::write(&path, bytes)
            .await
            .map_err(|e| BlobError::Io(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<bool, BlobError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BlobError::Io(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf()).await.unwrap();

        let key = FsBlobStore::key_for_hash(&content_hash(b"hello"));
        store.write(&key, b"hello").await.unwrap();
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.read(&key).await.unwrap(), b"hello");
        assert!(store.delete(&key).await.unwrap());
        assert!(!store.exists(&key).await.unwrap());
        // Deleting again reports false, not an error.
        assert!(!store.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf()).await.unwrap();
        assert!(store.read("../outside").await.is_err());
        assert!(store.write("/absolute/path", b"x").await.is_err());
    }

    #[test]
    fn hash_is_stable_hex() {
        let h = content_hash(b"cat");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash(b"cat"));
        assert_ne!(h, content_hash(b"dog"));
    }
}
