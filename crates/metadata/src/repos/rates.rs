//! Per-origin upload counts for rate limiting.

use crate::error::MetadataResult;
use crate::models::RateWindowCounts;
use async_trait::async_trait;

/// Trailing window lengths in seconds.
pub const MINUTE_SECS: i64 = 60;
pub const HOUR_SECS: i64 = 3600;
pub const DAY_SECS: i64 = 86_400;

/// Repository for upload rate queries. Counts are derived from stored records
/// on demand and never persisted.
#[async_trait]
pub trait RateRepo: Send + Sync {
    /// Number of records from `origin` with `created_at >= since`.
    async fn count_since(&self, origin: &str, since: i64) -> MetadataResult<u64>;

    /// Counts for the trailing minute, hour and day ending at `now`.
    async fn rate_window_counts(&self, origin: &str, now: i64) -> MetadataResult<RateWindowCounts>;
}
