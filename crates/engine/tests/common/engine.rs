//! Engine test utilities.

use async_trait::async_trait;
use bytes::Bytes;
use filedrop_core::config::AppConfig;
use filedrop_engine::Engine;
use filedrop_metadata::{MetadataStore, SqliteStore};
use filedrop_storage::{FilesystemBackend, ObjectMeta, ObjectStore, StorageError, StorageResult};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

/// An engine over a temporary directory, cleaned up on drop.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestEngine {
    pub engine: Engine,
    sqlite: Arc<SqliteStore>,
    blob_dir: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestEngine {
    /// Create an engine with test defaults: no rate limits, no expiry.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create an engine after adjusting the test configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let (engine, _) = Self::with_flaky_backend(adjust).await;
        engine
    }

    /// Create an engine whose blob writes and deletes can be made to fail.
    pub async fn with_flaky_backend(
        adjust: impl FnOnce(&mut AppConfig),
    ) -> (Self, Arc<FlakyBackend>) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut config = AppConfig::for_testing(temp_dir.path());
        adjust(&mut config);

        let blob_dir = temp_dir.path().join("files");
        let flaky = Arc::new(FlakyBackend {
            inner: FilesystemBackend::new(&blob_dir)
                .await
                .expect("Failed to create storage backend"),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        });
        let backend: Arc<dyn ObjectStore> = flaky.clone();
        let sqlite = Arc::new(
            SqliteStore::new(temp_dir.path().join("files.db"), None)
                .await
                .expect("Failed to create metadata store"),
        );
        let metadata: Arc<dyn MetadataStore> = sqlite.clone();

        let engine = Engine::new(config, backend, metadata).expect("Failed to create engine");

        let test_engine = Self {
            engine,
            sqlite,
            blob_dir,
            _temp_dir: temp_dir,
        };
        (test_engine, flaky)
    }

    /// Raw pool for manipulating records behind the engine's back.
    pub fn pool(&self) -> &Pool<Sqlite> {
        self.sqlite.pool()
    }

    /// Move every record's `created_at` back by `secs`.
    pub async fn age_records(&self, secs: i64) {
        sqlx::query("UPDATE objects SET created_at = created_at - ?")
            .bind(secs)
            .execute(self.pool())
            .await
            .expect("Failed to age records");
    }

    /// Move one record's `created_at` back by `secs`.
    pub async fn age_record(&self, id: i64, secs: i64) {
        sqlx::query("UPDATE objects SET created_at = created_at - ? WHERE id = ?")
            .bind(secs)
            .bind(id)
            .execute(self.pool())
            .await
            .expect("Failed to age record");
    }

    /// Number of blobs in the content directory.
    pub fn blob_count(&self) -> usize {
        std::fs::read_dir(&self.blob_dir)
            .expect("Failed to read blob directory")
            .filter_map(Result::ok)
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .count()
    }

    /// Delete a blob file directly, as a concurrent eviction would.
    pub fn delete_blob_file(&self, content_name: &str) {
        std::fs::remove_file(self.blob_dir.join(content_name)).expect("Failed to delete blob");
    }

    /// Swap a blob file for a directory of the same name so reads fail with
    /// an I/O error rather than a miss.
    pub fn replace_blob_with_dir(&self, content_name: &str) {
        self.delete_blob_file(content_name);
        std::fs::create_dir(self.blob_dir.join(content_name)).expect("Failed to create directory");
    }
}

/// Filesystem backend with switchable write and delete failures.
#[allow(dead_code)]
pub struct FlakyBackend {
    inner: FilesystemBackend,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

#[allow(dead_code)]
impl FlakyBackend {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
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
        self.inner.put(key, data).await
    }

    async fn put_if_not_exists(&self, key: &str, data: Bytes) -> StorageResult<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("write"));
        }
        self.inner.put_if_not_exists(key, data).await
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
