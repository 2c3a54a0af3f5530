//! Retention and capacity eviction.
//!
//! A sweep first drops records older than the persistence window, then, if
//! the blob store is over its byte budget, drops the single oldest record. A
//! blob is removed only once no record references its content name.
//! Failures are logged and counted; a sweep never fails its caller.

use crate::metrics;
use filedrop_core::config::LimitsConfig;
use filedrop_metadata::MetadataStore;
use filedrop_metadata::repos::{ObjectRepo, RetentionRepo};
use filedrop_storage::ContentStore;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    /// Content names of records dropped for age.
    pub expired: Vec<String>,
    /// Content names of records dropped to get under the storage budget.
    pub evicted: Vec<String>,
    /// Blobs deleted from the store.
    pub blobs_removed: u64,
    /// Blobs that could not be deleted; their records are already gone.
    pub removal_failures: u64,
    /// Blobs left in place because another record still references them.
    pub shared_blobs_kept: u64,
    /// Failures that were logged and skipped.
    pub errors: u64,
}

impl SweepReport {
    pub fn records_removed(&self) -> usize {
        self.expired.len() + self.evicted.len()
    }
}

/// Eviction policy derived from [`LimitsConfig`].
#[derive(Debug, Clone, Copy)]
pub struct EvictionEngine {
    persistence_secs: Option<i64>,
    budget_bytes: Option<u64>,
}

impl EvictionEngine {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            persistence_secs: limits.persistence().map(|d| d.whole_seconds()),
            budget_bytes: limits.storage_budget_bytes(),
        }
    }

    /// Whether either policy is active.
    pub fn is_enabled(&self) -> bool {
        self.persistence_secs.is_some() || self.budget_bytes.is_some()
    }

    /// Run one sweep at `now` (unix seconds).
    ///
    /// The caller must hold the engine's write lock so no upload interleaves
    /// between a record delete and the reference check for its blob.
    pub async fn sweep(
        &self,
        content: &ContentStore,
        metadata: &Arc<dyn MetadataStore>,
        now: i64,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        if let Some(secs) = self.persistence_secs {
            let cutoff = now.saturating_sub(secs);
            match metadata.delete_expired(cutoff).await {
                Ok(names) => {
                    release_blobs(content, metadata, &names, &mut report).await;
                    report.expired = names;
                }
                Err(e) => {
                    tracing::error!(error = %e, cutoff, "Failed to delete expired records");
                    metrics::record_eviction_error("delete_expired");
                    report.errors += 1;
                }
            }
        }

        if let Some(budget) = self.budget_bytes {
            self.enforce_budget(budget, content, metadata, &mut report)
                .await;
        }

        if report.records_removed() > 0 {
            tracing::info!(
                expired = report.expired.len(),
                evicted = report.evicted.len(),
                blobs_removed = report.blobs_removed,
                shared_blobs_kept = report.shared_blobs_kept,
                removal_failures = report.removal_failures,
                errors = report.errors,
                "Eviction sweep removed records"
            );
        }
        metrics::record_eviction("expired", report.expired.len());
        metrics::record_eviction("capacity", report.evicted.len());
        report
    }

    async fn enforce_budget(
        &self,
        budget: u64,
        content: &ContentStore,
        metadata: &Arc<dyn MetadataStore>,
        report: &mut SweepReport,
    ) {
        let total = match content.total_size_bytes().await {
            Ok(total) => total,
            Err(e) => {
                tracing::error!(error = %e, "Failed to measure blob store size");
                metrics::record_eviction_error("measure");
                report.errors += 1;
                return;
            }
        };
        if total <= budget {
            return;
        }

        // One record per sweep; every request ends with a sweep.
        match metadata.delete_oldest(1).await {
            Ok(names) if names.is_empty() => {
                tracing::warn!(
                    total_bytes = total,
                    budget_bytes = budget,
                    "Blob store over budget with no records left to evict"
                );
            }
            Ok(names) => {
                tracing::debug!(content_name = ?names, total_bytes = total, "Evicting oldest record");
                release_blobs(content, metadata, &names, report).await;
                report.evicted = names;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to delete oldest record");
                metrics::record_eviction_error("delete_oldest");
                report.errors += 1;
            }
        }
    }
}

/// Remove the blobs behind deleted records unless still referenced.
async fn release_blobs(
    content: &ContentStore,
    metadata: &Arc<dyn MetadataStore>,
    names: &[String],
    report: &mut SweepReport,
) {
    let unique: BTreeSet<&str> = names.iter().map(String::as_str).collect();
    for name in unique {
        match metadata.count_content_references(name).await {
            Ok(0) => {}
            Ok(refs) => {
                tracing::debug!(content_name = %name, refs, "Blob still referenced, keeping");
                report.shared_blobs_kept += 1;
                continue;
            }
            Err(e) => {
                tracing::error!(content_name = %name, error = %e, "Failed to count blob references");
                metrics::record_eviction_error("count_references");
                report.errors += 1;
                continue;
            }
        }

        match content.remove(name).await {
            Ok(()) => report.blobs_removed += 1,
            Err(e) => {
                tracing::error!(content_name = %name, error = %e, "Failed to remove blob");
                metrics::record_eviction_error("remove_blob");
                report.removal_failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filedrop_core::config::MIB;

    fn limits(hours: u64, storage_mb: u64) -> LimitsConfig {
        LimitsConfig {
            file_size_limit_mb: 0,
            file_persistence_hours: hours,
            storage_size_limit_mb: storage_mb,
        }
    }

    #[test]
    fn test_policy_from_limits() {
        let engine = EvictionEngine::new(&limits(2, 10));
        assert_eq!(engine.persistence_secs, Some(7200));
        assert_eq!(engine.budget_bytes, Some(10 * MIB));
        assert!(engine.is_enabled());

        assert!(!EvictionEngine::new(&limits(0, 0)).is_enabled());
    }
}
