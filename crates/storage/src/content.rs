//! Content-addressed blob store.
//!
//! Blobs are named `<sha256 hex><extension>`. Writes happen in two phases:
//! [`ContentStore::stage`] drains a reader into memory while hashing it and
//! enforcing the size ceiling, then [`ContentStore::commit`] writes the staged
//! bytes atomically. [`ContentStore::put`] does both.

use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use bytes::{Bytes, BytesMut};
use filedrop_core::ContentDigest;
use filedrop_core::locator::sanitize_extension;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read buffer size while staging (64 KiB).
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Bytes that have been read, hashed and size-checked but not yet written.
#[derive(Clone, Debug)]
pub struct StagedBlob {
    pub digest: ContentDigest,
    /// Final blob name, `<digest hex><extension>`.
    pub name: String,
    pub data: Bytes,
}

impl StagedBlob {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A blob that is durably stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    pub digest: ContentDigest,
    pub name: String,
    pub size: u64,
    /// Whether this write created the blob. `false` means identical content was
    /// already stored under the same name.
    pub newly_written: bool,
}

/// Content-addressed store over an [`ObjectStore`] backend.
#[derive(Clone)]
pub struct ContentStore {
    backend: Arc<dyn ObjectStore>,
    max_blob_bytes: Option<u64>,
}

impl ContentStore {
    /// Create a store. `max_blob_bytes` of `None` accepts any size.
    pub fn new(backend: Arc<dyn ObjectStore>, max_blob_bytes: Option<u64>) -> Self {
        Self {
            backend,
            max_blob_bytes,
        }
    }

    pub fn backend(&self) -> &Arc<dyn ObjectStore> {
        &self.backend
    }

    /// Drain `reader`, hashing as it goes.
    ///
    /// Fails with `TooLarge` as soon as the ceiling is crossed, without reading
    /// the rest of the input, and with `EmptyInput` for zero bytes. Nothing is
    /// written to the backend.
    pub async fn stage<R>(&self, mut reader: R, extension: Option<&str>) -> StorageResult<StagedBlob>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut hasher = ContentDigest::hasher();
        let mut buffer = BytesMut::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            hasher.update(&chunk[..n]);
            if let Some(limit) = self.max_blob_bytes
                && hasher.len() > limit
            {
                return Err(StorageError::TooLarge { limit });
            }
            buffer.extend_from_slice(&chunk[..n]);
        }

        if hasher.is_empty() {
            return Err(StorageError::EmptyInput);
        }

        let digest = hasher.finalize();
        let extension = extension.and_then(sanitize_extension).unwrap_or_default();
        Ok(StagedBlob {
            digest,
            name: format!("{}{}", digest.to_hex(), extension),
            data: buffer.freeze(),
        })
    }

    /// Durably write a staged blob. Existing blobs of the same name are left
    /// untouched since their content is identical.
    pub async fn commit(&self, staged: StagedBlob) -> StorageResult<StoredBlob> {
        let size = staged.size();
        let newly_written = self
            .backend
            .put_if_not_exists(&staged.name, staged.data)
            .await?;

        tracing::debug!(
            content_name = %staged.name,
            size,
            newly_written,
            "Committed blob"
        );

        Ok(StoredBlob {
            digest: staged.digest,
            name: staged.name,
            size,
            newly_written,
        })
    }

    /// Stage and commit in one step.
    pub async fn put<R>(&self, reader: R, extension: Option<&str>) -> StorageResult<StoredBlob>
    where
        R: AsyncRead + Unpin + Send,
    {
        let staged = self.stage(reader, extension).await?;
        self.commit(staged).await
    }

    /// Fetch a blob's bytes.
    pub async fn get(&self, name: &str) -> StorageResult<Bytes> {
        self.backend.get(name).await
    }

    /// Remove a blob. Removing a blob that is already gone succeeds.
    pub async fn remove(&self, name: &str) -> StorageResult<()> {
        match self.backend.delete(name).await {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Total bytes of all stored blobs.
    pub async fn total_size_bytes(&self) -> StorageResult<u64> {
        self.backend.total_size().await
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        self.backend.health_check().await
    }
}
