//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A plain (bucketless) record already uses this content name.
    #[error("content already registered: {0}")]
    DuplicateName(String),

    /// The `(bucket, alias)` pair is taken.
    #[error("alias already taken: {bucket}/{alias}")]
    DuplicateAlias { bucket: String, alias: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
