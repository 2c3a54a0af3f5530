//! Per-origin upload rate limiting.
//!
//! Limits are evaluated against the registry, not an in-memory counter: the
//! number of records an origin created in the trailing minute, hour and day.
//! A window with a limit of zero is disabled. The caller must hold the engine's
//! write lock across `admit` and the following insert, otherwise concurrent
//! uploads from one origin can both pass at `limit - 1`.

use crate::error::{EngineError, EngineResult};
use filedrop_core::config::RateLimitConfig;
use filedrop_metadata::MetadataStore;
use filedrop_metadata::RateWindowCounts;
use filedrop_metadata::repos::RateRepo;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A trailing rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateWindow {
    Minute,
    Hour,
    Day,
}

impl RateWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

impl fmt::Display for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless evaluator of the configured windows.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Option<Arc<RateLimiterInner>>,
}

/// Only allocated when at least one window is active.
struct RateLimiterInner {
    per_minute: u32,
    per_hour: u32,
    per_day: u32,
    excluded: HashSet<String>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled() {
            return Self::disabled();
        }
        Self {
            inner: Some(Arc::new(RateLimiterInner {
                per_minute: config.ip_rate_limit_per_minute,
                per_hour: config.ip_rate_limit_per_hour,
                per_day: config.ip_rate_limit_per_day,
                excluded: config
                    .excluded_origins
                    .iter()
                    .map(|o| o.trim().to_string())
                    .collect(),
            })),
        }
    }

    /// A limiter that admits everything.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Check whether `origin` may upload at `now`.
    ///
    /// Windows are checked minute, hour, day; the first violated one is
    /// reported. A window is violated when the count has already reached the
    /// limit.
    pub async fn admit(
        &self,
        metadata: &Arc<dyn MetadataStore>,
        origin: &str,
        now: i64,
    ) -> EngineResult<()> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };
        if inner.excluded.contains(origin) {
            tracing::trace!(origin = %origin, "Origin excluded from rate limiting");
            return Ok(());
        }

        let counts = metadata.rate_window_counts(origin, now).await?;
        match inner.first_violation(&counts) {
            Some((window, limit)) => {
                tracing::info!(
                    origin = %origin,
                    window = %window,
                    limit,
                    "Upload rate limit exceeded"
                );
                Err(EngineError::RateLimitExceeded { window, limit })
            }
            None => Ok(()),
        }
    }
}

impl RateLimiterInner {
    fn first_violation(&self, counts: &RateWindowCounts) -> Option<(RateWindow, u32)> {
        [
            (RateWindow::Minute, self.per_minute, counts.minute),
            (RateWindow::Hour, self.per_hour, counts.hour),
            (RateWindow::Day, self.per_day, counts.day),
        ]
        .into_iter()
        .find(|(_, limit, count)| *limit > 0 && *count >= i64::from(*limit))
        .map(|(window, limit, _)| (window, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filedrop_metadata::repos::ObjectRepo;
    use filedrop_metadata::{NewStoredObject, SqliteStore};

    fn config(minute: u32, hour: u32, day: u32) -> RateLimitConfig {
        RateLimitConfig {
            ip_rate_limit_per_minute: minute,
            ip_rate_limit_per_hour: hour,
            ip_rate_limit_per_day: day,
            excluded_origins: Vec::new(),
        }
    }

    fn inner(minute: u32, hour: u32, day: u32) -> RateLimiterInner {
        RateLimiterInner {
            per_minute: minute,
            per_hour: hour,
            per_day: day,
            excluded: HashSet::new(),
        }
    }

    fn counts(minute: i64, hour: i64, day: i64) -> RateWindowCounts {
        RateWindowCounts { minute, hour, day }
    }

    #[test]
    fn test_disabled_when_all_zero() {
        assert!(!RateLimiter::new(&config(0, 0, 0)).is_enabled());
        assert!(RateLimiter::new(&config(0, 0, 1)).is_enabled());
    }

    #[test]
    fn test_violation_at_limit() {
        let limiter = inner(3, 0, 0);
        assert_eq!(limiter.first_violation(&counts(2, 2, 2)), None);
        assert_eq!(
            limiter.first_violation(&counts(3, 3, 3)),
            Some((RateWindow::Minute, 3))
        );
    }

    #[test]
    fn test_windows_checked_in_order() {
        let limiter = inner(5, 10, 20);
        assert_eq!(
            limiter.first_violation(&counts(5, 10, 20)),
            Some((RateWindow::Minute, 5))
        );
        assert_eq!(
            limiter.first_violation(&counts(1, 10, 20)),
            Some((RateWindow::Hour, 10))
        );
        assert_eq!(
            limiter.first_violation(&counts(1, 2, 20)),
            Some((RateWindow::Day, 20))
        );
    }

    #[test]
    fn test_zero_window_is_skipped() {
        let limiter = inner(0, 2, 0);
        assert_eq!(
            limiter.first_violation(&counts(100, 2, 100)),
            Some((RateWindow::Hour, 2))
        );
    }

    #[tokio::test]
    async fn test_admit_against_registry() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(dir.path().join("files.db"), None)
                .await
                .unwrap(),
        );
        let mut cfg = config(2, 0, 0);
        cfg.excluded_origins = vec!["10.0.0.1".to_string()];
        let limiter = RateLimiter::new(&cfg);
        let now = 10_000;

        for (i, origin) in ["1.2.3.4", "1.2.3.4", "10.0.0.1", "10.0.0.1"].iter().enumerate() {
            store
                .insert_object(&NewStoredObject::plain(format!("blob{i}"), *origin, now))
                .await
                .unwrap();
        }

        match limiter.admit(&store, "1.2.3.4", now).await {
            Err(EngineError::RateLimitExceeded { window, limit }) => {
                assert_eq!(window, RateWindow::Minute);
                assert_eq!(limit, 2);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
        limiter.admit(&store, "10.0.0.1", now).await.unwrap();
        limiter.admit(&store, "5.6.7.8", now).await.unwrap();
        // The minute window has slid past both uploads.
        limiter.admit(&store, "1.2.3.4", now + 61).await.unwrap();
    }
}
