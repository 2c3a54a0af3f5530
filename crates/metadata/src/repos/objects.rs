//! Stored object repository.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{NewStoredObject, StoredObjectRow};
use async_trait::async_trait;
use filedrop_core::ShortCodeCodec;

/// Repository for stored object records.
#[async_trait]
pub trait ObjectRepo: Send + Sync {
    /// Insert a record and return its newly assigned id.
    ///
    /// Fails with `DuplicateName` when a plain record already uses the content
    /// name, and with `DuplicateAlias` when the `(bucket, alias)` pair is taken.
    async fn insert_object(&self, object: &NewStoredObject) -> MetadataResult<i64>;

    /// Get a record by id.
    async fn get_object(&self, id: i64) -> MetadataResult<Option<StoredObjectRow>>;

    /// Get a record by bucket and alias.
    async fn get_by_alias(&self, bucket: &str, alias: &str)
    -> MetadataResult<Option<StoredObjectRow>>;

    /// Get the plain (bucketless) record for a content name, if any.
    async fn find_plain_by_content_name(
        &self,
        content_name: &str,
    ) -> MetadataResult<Option<StoredObjectRow>>;

    /// Number of records, plain or aliased, that point at a content name.
    async fn count_content_references(&self, content_name: &str) -> MetadataResult<u64>;

    /// Total number of records.
    async fn count_objects(&self) -> MetadataResult<u64>;

    /// Resolve a short code to its record.
    ///
    /// Malformed codes and unknown ids are both reported as `NotFound`.
    async fn resolve_by_short_code(
        &self,
        codec: &ShortCodeCodec,
        code: &str,
    ) -> MetadataResult<StoredObjectRow> {
        let not_found = || MetadataError::NotFound(format!("short code {code}"));
        let id = codec.decode(code).map_err(|_| not_found())?;
        let id = i64::try_from(id).map_err(|_| not_found())?;
        self.get_object(id).await?.ok_or_else(not_found)
    }

    /// Resolve a `(bucket, alias)` pair to its record.
    async fn resolve_by_alias(&self, bucket: &str, alias: &str) -> MetadataResult<StoredObjectRow> {
        self.get_by_alias(bucket, alias)
            .await?
            .ok_or_else(|| MetadataError::NotFound(format!("alias {bucket}/{alias}")))
    }
}
