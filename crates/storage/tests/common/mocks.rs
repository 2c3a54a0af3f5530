use async_trait::async_trait;
use bytes::Bytes;
use filedrop_storage::error::{StorageError, StorageResult};
use filedrop_storage::traits::{ObjectMeta, ObjectStore};
use filedrop_storage::FilesystemBackend;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Filesystem backend whose writes and deletes can be made to fail on demand.
#[allow(dead_code)]
pub struct FlakyBackend {
    inner: FilesystemBackend,
    pub fail_writes: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub writes: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyBackend {
    pub async fn new(root: &std::path::Path) -> Arc<Self> {
        Arc::new(Self {
            inner: FilesystemBackend::new(root).await.unwrap(),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        })
    }

    fn injected(op: &str) -> StorageError {
        StorageError::Io(std::io::Error::other(format!("injected {op} failure")))
    }
}

#[async_trait]
impl ObjectStore for FlakyBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("write"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, data).await
    }

    async fn put_if_not_exists(&self, key: &str, data: Bytes) -> StorageResult<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("write"));
        }
        let created = self.inner.put_if_not_exists(key, data).await?;
        if created {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(created)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete"));
        }
        self.inner.delete(key).await
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        self.inner.list().await
    }

    async fn total_size(&self) -> StorageResult<u64> {
        self.inner.total_size().await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}
