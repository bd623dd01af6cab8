//! Byte storage for document content.
//!
//! The pipeline treats storage as an external collaborator behind the
//! `ByteStore` trait. The filesystem store lays content out under
//! two-level hash-prefixed directories; the in-memory store backs tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

/// Storage failures surfaced to the pipeline caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored content for document: {0}")]
    Missing(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable storage of raw document bytes, keyed by document id.
#[async_trait]
pub trait ByteStore: Send + Sync {
    async fn save(&self, id: &str, content: &[u8]) -> Result<(), StoreError>;
    async fn load(&self, id: &str) -> Result<Vec<u8>, StoreError>;
}

/// Filesystem-backed store.
///
/// Content lives at `{root}/{id[0..2]}/{id}.bin`; the two-level prefix
/// keeps directory fan-out bounded for large corpora.
pub struct FsByteStore {
    root: PathBuf,
}

impl FsByteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn content_path(&self, id: &str) -> PathBuf {
        let prefix = if id.len() >= 2 { &id[..2] } else { id };
        self.root.join(prefix).join(format!("{id}.bin"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ByteStore for FsByteStore {
    async fn save(&self, id: &str, content: &[u8]) -> Result<(), StoreError> {
        let path = self.content_path(id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.content_path(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::Missing(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryByteStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ByteStore for MemoryByteStore {
    async fn save(&self, id: &str, content: &[u8]) -> Result<(), StoreError> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .insert(id.to_string(), content.to_vec());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::Missing(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let store = MemoryByteStore::new();
        store.save("abc123", b"payload").await.unwrap();
        assert_eq!(store.load("abc123").await.unwrap(), b"payload");
        assert!(matches!(
            store.load("missing").await,
            Err(StoreError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsByteStore::new(dir.path());
        store.save("abc123", b"payload").await.unwrap();
        assert_eq!(store.load("abc123").await.unwrap(), b"payload");

        // Two-level prefix layout.
        assert!(dir.path().join("ab").join("abc123.bin").exists());
    }

    #[tokio::test]
    async fn test_fs_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsByteStore::new(dir.path());
        assert!(matches!(
            store.load("nothere").await,
            Err(StoreError::Missing(_))
        ));
    }
}
