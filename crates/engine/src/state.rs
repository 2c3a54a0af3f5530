//! Engine state shared by every operation.

use crate::error::{EngineError, EngineResult};
use crate::eviction::{EvictionEngine, SweepReport};
use crate::metrics;
use crate::ratelimit::RateLimiter;
use filedrop_core::ShortCodeCodec;
use filedrop_core::config::AppConfig;
use filedrop_metadata::MetadataStore;
use filedrop_storage::{ContentStore, ObjectStore};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The file drop engine.
///
/// Cheap to clone; clones share the store handles and the write lock.
/// Admission, blob commit and record insert for one upload run under the
/// write lock, as does the eviction sweep. Downloads never take it.
#[derive(Clone)]
pub struct Engine {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) content: ContentStore,
    pub(crate) metadata: Arc<dyn MetadataStore>,
    pub(crate) codec: ShortCodeCodec,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) eviction: EvictionEngine,
    pub(crate) write_lock: Arc<Mutex<()>>,
}

impl Engine {
    /// Build an engine and its stores from configuration.
    pub async fn from_config(config: AppConfig) -> EngineResult<Self> {
        let warnings = config.validate().map_err(EngineError::InvalidInput)?;
        for warning in &warnings {
            tracing::warn!("{warning}");
        }

        let backend = filedrop_storage::from_config(&config.storage)
            .await
            .map_err(EngineError::StorageIo)?;
        let metadata = filedrop_metadata::from_config(&config.metadata)
            .await
            .map_err(EngineError::IndexIo)?;

        tracing::info!(
            storage = backend.backend_name(),
            max_upload_bytes = ?config.limits.max_upload_bytes(),
            storage_budget_bytes = ?config.limits.storage_budget_bytes(),
            persistence_hours = config.limits.file_persistence_hours,
            rate_limited = config.rate_limit.enabled(),
            "Engine initialized"
        );

        Self::new(config, backend, metadata)
    }

    /// Build an engine over existing stores.
    pub fn new(
        config: AppConfig,
        backend: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> EngineResult<Self> {
        metrics::register_metrics();

        let codec = ShortCodeCodec::new(config.short_code.min_length)?;
        let content = ContentStore::new(backend, config.limits.max_upload_bytes());
        let rate_limiter = RateLimiter::new(&config.rate_limit);
        let eviction = EvictionEngine::new(&config.limits);

        Ok(Self {
            config: Arc::new(config),
            content,
            metadata,
            codec,
            rate_limiter,
            eviction,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn codec(&self) -> &ShortCodeCodec {
        &self.codec
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Run an eviction sweep at the current time.
    pub async fn run_eviction_sweep(&self) -> SweepReport {
        self.run_eviction_sweep_at(filedrop_core::unix_now()).await
    }

    /// Run an eviction sweep as of `now` (unix seconds).
    pub async fn run_eviction_sweep_at(&self, now: i64) -> SweepReport {
        if !self.eviction.is_enabled() {
            return SweepReport::default();
        }

        let _guard = self.write_lock.lock().await;
        let started = Instant::now();
        let report = self.eviction.sweep(&self.content, &self.metadata, now).await;
        metrics::EVICTION_SWEEPS.inc();
        metrics::SWEEP_DURATION.observe(started.elapsed().as_secs_f64());
        report
    }

    /// Hold the write lock until the returned guard is dropped.
    ///
    /// Uploads still stage while paused but cannot commit; sweeps wait.
    pub async fn pause_writes(&self) -> OwnedMutexGuard<()> {
        self.write_lock.clone().lock_owned().await
    }

    /// Verify both stores are reachable.
    pub async fn health_check(&self) -> EngineResult<()> {
        self.content.health_check().await?;
        self.metadata.health_check().await?;
        Ok(())
    }
}
