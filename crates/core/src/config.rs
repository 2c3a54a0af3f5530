//! Configuration types shared across crates.
//!
//! Every size or count limit uses `0` to mean "disabled" or "unbounded".

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// One mebibyte, the unit of every `*_mb` setting.
pub const MIB: u64 = 1024 * 1024;

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Directory holding content blobs.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/files"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("storage.path must not be empty".to_string())
            }
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds (advisory only; SQLite cannot cancel a
        /// running statement). Slow queries are logged.
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(30)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/files.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

/// Size and retention limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted upload in MiB (0 = unlimited).
    #[serde(default = "default_file_size_limit_mb")]
    pub file_size_limit_mb: u64,
    /// Hours a record lives before the eviction sweep removes it (0 = forever).
    #[serde(default)]
    pub file_persistence_hours: u64,
    /// Total content directory budget in MiB (0 = unbounded).
    #[serde(default = "default_storage_size_limit_mb")]
    pub storage_size_limit_mb: u64,
}

fn default_file_size_limit_mb() -> u64 {
    100
}

fn default_storage_size_limit_mb() -> u64 {
    2048
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            file_size_limit_mb: default_file_size_limit_mb(),
            file_persistence_hours: 0,
            storage_size_limit_mb: default_storage_size_limit_mb(),
        }
    }
}

impl LimitsConfig {
    /// Upload ceiling in bytes, `None` when unlimited.
    pub fn max_upload_bytes(&self) -> Option<u64> {
        mib_to_bytes(self.file_size_limit_mb)
    }

    /// Storage budget in bytes, `None` when unbounded.
    pub fn storage_budget_bytes(&self) -> Option<u64> {
        mib_to_bytes(self.storage_size_limit_mb)
    }

    /// Record lifetime, `None` when records never expire.
    pub fn persistence(&self) -> Option<Duration> {
        match self.file_persistence_hours {
            0 => None,
            // Saturate rather than wrap for absurd values
            hours => Some(Duration::hours(i64::try_from(hours).unwrap_or(i64::MAX / 3600))),
        }
    }

    /// Validate limits for values that cannot be represented.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("limits.file_size_limit_mb", self.file_size_limit_mb),
            ("limits.storage_size_limit_mb", self.storage_size_limit_mb),
        ] {
            if value.checked_mul(MIB).is_none() {
                return Err(format!("{name} {value} overflows a byte count"));
            }
        }
        if self.file_persistence_hours > (i64::MAX / 3600) as u64 {
            return Err(format!(
                "limits.file_persistence_hours {} exceeds maximum value {}",
                self.file_persistence_hours,
                i64::MAX / 3600
            ));
        }
        Ok(())
    }
}

fn mib_to_bytes(mb: u64) -> Option<u64> {
    match mb {
        0 => None,
        mb => Some(mb.saturating_mul(MIB)),
    }
}

/// Per-origin upload rate limits.
///
/// Counts come from stored records, so limits survive restarts and apply to
/// uploads only.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Uploads allowed per origin in any 60 second window (0 = disabled).
    #[serde(default)]
    pub ip_rate_limit_per_minute: u32,
    /// Uploads allowed per origin in any hour (0 = disabled).
    #[serde(default)]
    pub ip_rate_limit_per_hour: u32,
    /// Uploads allowed per origin in any day (0 = disabled).
    #[serde(default)]
    pub ip_rate_limit_per_day: u32,
    /// Origins that bypass every window.
    #[serde(default)]
    pub excluded_origins: Vec<String>,
}

impl RateLimitConfig {
    /// Whether any window is active.
    pub fn enabled(&self) -> bool {
        self.ip_rate_limit_per_minute > 0
            || self.ip_rate_limit_per_hour > 0
            || self.ip_rate_limit_per_day > 0
    }

    /// Validate rate limit configuration.
    /// Returns warnings for configs that are allowed but probably unintended.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.excluded_origins.iter().any(|o| o.trim().is_empty()) {
            return Err("rate_limit.excluded_origins must not contain empty entries".to_string());
        }

        let minute = self.ip_rate_limit_per_minute;
        let hour = self.ip_rate_limit_per_hour;
        let day = self.ip_rate_limit_per_day;
        if minute > 0 && hour > 0 && minute > hour {
            warnings.push(format!(
                "rate_limit.ip_rate_limit_per_minute={minute} exceeds ip_rate_limit_per_hour={hour}; \
                 the hourly window will bind first"
            ));
        }
        if hour > 0 && day > 0 && hour > day {
            warnings.push(format!(
                "rate_limit.ip_rate_limit_per_hour={hour} exceeds ip_rate_limit_per_day={day}; \
                 the daily window will bind first"
            ));
        }

        Ok(warnings)
    }
}

/// Short code settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShortCodeConfig {
    /// Minimum number of characters in a generated short code.
    #[serde(default = "default_short_code_min_length")]
    pub min_length: u32,
}

fn default_short_code_min_length() -> u32 {
    crate::shortcode::DEFAULT_MIN_LENGTH
}

impl Default for ShortCodeConfig {
    fn default() -> Self {
        Self {
            min_length: default_short_code_min_length(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Content blob storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Record registry.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Size and retention limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Per-origin rate limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Short code generation.
    #[serde(default)]
    pub short_code: ShortCodeConfig,
}

impl AppConfig {
    /// Create a test configuration rooted in `dir`.
    ///
    /// **For testing only.** Limits are the defaults and rate limiting is off.
    pub fn for_testing(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            storage: StorageConfig::Filesystem {
                path: dir.join("files"),
            },
            metadata: MetadataConfig::Sqlite {
                path: dir.join("files.db"),
                query_timeout_secs: None,
            },
            ..Self::default()
        }
    }

    /// Validate the whole configuration, returning non-fatal warnings.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        self.storage.validate()?;
        self.limits.validate()?;
        crate::ShortCodeCodec::new(self.short_code.min_length).map_err(|e| e.to_string())?;
        self.rate_limit.validate()
    }
}
