//! Database models mapping to the registry schema.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One stored object: a plain upload or a bucket/alias upload.
///
/// `created_at` is unix seconds and is written once, on insert.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StoredObjectRow {
    pub id: i64,
    pub content_name: String,
    pub bucket: Option<String>,
    pub alias: Option<String>,
    pub origin: String,
    pub created_at: i64,
}

impl StoredObjectRow {
    /// Whether this is a plain upload addressed by short code.
    pub fn is_plain(&self) -> bool {
        self.bucket.is_none()
    }
}

/// A record about to be inserted. The registry assigns the id.
#[derive(Debug, Clone)]
pub struct NewStoredObject {
    pub content_name: String,
    pub alias: Option<AliasKey>,
    pub origin: String,
    pub created_at: i64,
}

impl NewStoredObject {
    pub fn plain(content_name: impl Into<String>, origin: impl Into<String>, now: i64) -> Self {
        Self {
            content_name: content_name.into(),
            alias: None,
            origin: origin.into(),
            created_at: now,
        }
    }

    pub fn aliased(
        content_name: impl Into<String>,
        alias: AliasKey,
        origin: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            content_name: content_name.into(),
            alias: Some(alias),
            origin: origin.into(),
            created_at: now,
        }
    }
}

/// `(bucket, alias)` pair; both halves are always set together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AliasKey {
    pub bucket: String,
    pub alias: String,
}

impl AliasKey {
    pub fn new(bucket: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            alias: alias.into(),
        }
    }
}

/// Upload counts for one origin over the trailing minute, hour and day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RateWindowCounts {
    pub minute: i64,
    pub hour: i64,
    pub day: i64,
}
