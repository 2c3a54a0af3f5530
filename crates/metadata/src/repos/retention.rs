//! Retention repository used by the eviction sweep.

use crate::error::MetadataResult;
use crate::models::StoredObjectRow;
use async_trait::async_trait;

/// Repository for age- and capacity-based record removal.
#[async_trait]
pub trait RetentionRepo: Send + Sync {
    /// Records with `created_at <= cutoff`, oldest first.
    async fn list_expired(&self, cutoff: i64) -> MetadataResult<Vec<StoredObjectRow>>;

    /// Delete every record with `created_at <= cutoff`.
    ///
    /// Selection and deletion run in one transaction, so the returned content
    /// names are exactly those of the deleted records, oldest first. A name
    /// appears once per deleted record.
    async fn delete_expired(&self, cutoff: i64) -> MetadataResult<Vec<String>>;

    /// Delete the `n` oldest records (ascending `created_at`, then `id`) and
    /// return their content names in that order.
    async fn delete_oldest(&self, n: u32) -> MetadataResult<Vec<String>>;
}
