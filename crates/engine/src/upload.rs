//! Upload coordination.
//!
//! An upload is pre-checked against the rate limits, staged (read, hashed,
//! size-checked) without the write lock, then admitted again, committed and
//! indexed under it. The locked part runs on its
//! own task so a caller that gives up mid-way cannot leave a blob without a
//! record or a record without a blob.

use crate::error::{EngineError, EngineResult};
use crate::metrics;
use crate::state::Engine;
use filedrop_core::Locator;
use filedrop_core::locator::{sanitize_extension, validate_name};
use filedrop_metadata::repos::ObjectRepo;
use filedrop_metadata::{AliasKey, MetadataError, NewStoredObject};
use filedrop_storage::{StagedBlob, StorageResult, StoredBlob};
use serde::Serialize;
use std::time::Instant;
use tokio::io::AsyncRead;

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    /// Where the object can be fetched from.
    pub locator: Locator,
    /// Short code of the new record; resolvable even for bucket uploads.
    pub short_code: String,
    pub id: i64,
    pub content_name: String,
    pub size: u64,
}

impl Engine {
    /// Store a plain upload.
    ///
    /// Identical content that already has a plain record is reported as
    /// [`EngineError::DuplicateContent`] carrying the existing locator.
    pub async fn upload<R>(
        &self,
        reader: R,
        origin: &str,
        extension_hint: Option<&str>,
    ) -> EngineResult<UploadReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        let result = async {
            self.precheck_rate(origin).await?;

            let extension = extension_hint.and_then(sanitize_extension);
            let staged = self.content.stage(reader, extension.as_deref()).await;
            self.run_locked(staged, origin.to_string(), None, extension)
                .await
        }
        .await;
        record_outcome(&result);
        result
    }

    /// Store an upload under a caller-chosen `(bucket, alias)`.
    ///
    /// A taken pair is rejected with [`EngineError::DuplicateAlias`] even when
    /// the content is identical.
    pub async fn upload_to_bucket<R>(
        &self,
        reader: R,
        origin: &str,
        bucket: &str,
        alias: &str,
    ) -> EngineResult<UploadReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        let result = async {
            self.precheck_rate(origin).await?;
            validate_name("bucket", bucket)?;
            validate_name("alias", alias)?;

            let extension = filedrop_core::locator::extension_of(alias);
            let staged = self.content.stage(reader, extension.as_deref()).await;
            self.run_locked(
                staged,
                origin.to_string(),
                Some(AliasKey::new(bucket, alias)),
                extension,
            )
            .await
        }
        .await;
        record_outcome(&result);
        result
    }

    /// Lock-free admission check so a limited origin's body is never read.
    ///
    /// Not authoritative: the check is repeated under the write lock right
    /// before the insert.
    async fn precheck_rate(&self, origin: &str) -> EngineResult<()> {
        self.rate_limiter
            .admit(&self.metadata, origin, filedrop_core::unix_now())
            .await
    }

    /// Hand the critical section to a detached task and wait for it.
    async fn run_locked(
        &self,
        staged: StorageResult<StagedBlob>,
        origin: String,
        alias: Option<AliasKey>,
        extension: Option<String>,
    ) -> EngineResult<UploadReceipt> {
        let engine = self.clone();
        let task = tokio::spawn(async move {
            let _guard = engine.write_lock.lock().await;
            let started = Instant::now();
            let result = engine
                .admit_and_store(staged, &origin, alias, extension.as_deref())
                .await;
            metrics::UPLOAD_DURATION.observe(started.elapsed().as_secs_f64());
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Upload task failed");
                Err(EngineError::Internal(format!("upload task failed: {e}")))
            }
        }
    }

    /// Admission, commit and insert. Caller holds the write lock.
    async fn admit_and_store(
        &self,
        staged: StorageResult<StagedBlob>,
        origin: &str,
        alias: Option<AliasKey>,
        extension: Option<&str>,
    ) -> EngineResult<UploadReceipt> {
        let now = filedrop_core::unix_now();
        self.rate_limiter.admit(&self.metadata, origin, now).await?;

        let staged = staged?;
        let blob = self.content.commit(staged).await?;

        let record = match &alias {
            Some(key) => NewStoredObject::aliased(&blob.name, key.clone(), origin, now),
            None => NewStoredObject::plain(&blob.name, origin, now),
        };

        let id = match self.metadata.insert_object(&record).await {
            Ok(id) => id,
            Err(MetadataError::DuplicateName(name)) => {
                return Err(self.existing_content(&name, extension).await);
            }
            Err(e) => {
                self.discard_blob(&blob).await;
                return Err(e.into());
            }
        };

        let short_code = self.codec.encode(id.unsigned_abs());
        let locator = match alias {
            Some(AliasKey { bucket, alias }) => Locator::alias(bucket, alias),
            None => Locator::short_code(&short_code, extension.map(str::to_string)),
        };

        if blob.newly_written {
            metrics::BYTES_STORED.inc_by(blob.size);
        }
        tracing::info!(
            id,
            locator = %locator,
            content_name = %blob.name,
            size = blob.size,
            newly_written = blob.newly_written,
            "Stored upload"
        );

        Ok(UploadReceipt {
            locator,
            short_code,
            id,
            content_name: blob.name,
            size: blob.size,
        })
    }

    /// Build the `DuplicateContent` error for an existing plain record.
    async fn existing_content(&self, content_name: &str, extension: Option<&str>) -> EngineError {
        match self.metadata.find_plain_by_content_name(content_name).await {
            Ok(Some(existing)) => {
                let code = self.codec.encode(existing.id.unsigned_abs());
                let locator = Locator::short_code(code, extension.map(str::to_string));
                tracing::debug!(
                    id = existing.id,
                    locator = %locator,
                    "Upload matches existing content"
                );
                EngineError::DuplicateContent {
                    locator: locator.to_string(),
                }
            }
            Ok(None) => EngineError::Internal(format!(
                "duplicate content name {content_name} has no plain record"
            )),
            Err(e) => e.into(),
        }
    }

    /// Best-effort removal of a blob whose record could not be inserted.
    async fn discard_blob(&self, blob: &StoredBlob) {
        if !blob.newly_written {
            return;
        }
        if let Err(e) = self.content.remove(&blob.name).await {
            tracing::error!(
                content_name = %blob.name,
                error = %e,
                "Failed to remove blob after rejected insert"
            );
        }
    }
}

fn record_outcome(result: &EngineResult<UploadReceipt>) {
    match result {
        Ok(_) => metrics::record_upload("stored"),
        Err(e) if e.is_success_equivalent() => metrics::record_upload("duplicate"),
        Err(e) => metrics::record_upload(e.code()),
    }
}
