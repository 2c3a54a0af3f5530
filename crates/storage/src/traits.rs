//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Flat key/value blob store.
///
/// Keys are relative names; backends are responsible for keeping them inside
/// their root.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's size without fetching content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object atomically, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Put an object only if it doesn't exist.
    ///
    /// Returns `true` if this call created the object.
    async fn put_if_not_exists(&self, key: &str, data: Bytes) -> StorageResult<bool>;

    /// Delete an object. Returns `NotFound` if it was already gone.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List object keys.
    async fn list(&self) -> StorageResult<Vec<String>>;

    /// Sum of the sizes of every stored object.
    ///
    /// Objects removed while the total is being computed count as zero bytes.
    async fn total_size(&self) -> StorageResult<u64>;

    /// Get the name of this storage backend, used in logs.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable and properly configured.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time (if available).
    pub last_modified: Option<time::OffsetDateTime>,
}
