//! Engine error types.

use crate::ratelimit::RateWindow;
use filedrop_metadata::MetadataError;
use filedrop_storage::StorageError;

/// Outcome kinds of an upload or download that did not simply succeed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("rate limit exceeded: at most {limit} uploads per {window}")]
    RateLimitExceeded { window: RateWindow, limit: u32 },

    /// Identical content was already uploaded; `locator` is the one it was
    /// given then.
    #[error("content already exists at {locator}")]
    DuplicateContent { locator: String },

    #[error("alias already taken: {bucket}/{alias}")]
    DuplicateAlias { bucket: String, alias: String },

    #[error("file too large: limit is {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("empty upload")]
    EmptyInput,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    StorageIo(StorageError),

    #[error("index error: {0}")]
    IndexIo(MetadataError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable identifier for presentation layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded { .. } => "rate_limited",
            Self::DuplicateContent { .. } => "already_exists",
            Self::DuplicateAlias { .. } => "alias_taken",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::EmptyInput => "empty_input",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::StorageIo(_) => "storage_error",
            Self::IndexIo(_) => "index_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// `DuplicateContent` still hands the caller a working locator.
    pub fn is_success_equivalent(&self) -> bool {
        matches!(self, Self::DuplicateContent { .. })
    }

    /// Whether the caller, rather than the system, is at fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::StorageIo(_) | Self::IndexIo(_) | Self::Internal(_)
        )
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::EmptyInput => Self::EmptyInput,
            StorageError::TooLarge { limit } => Self::FileTooLarge { limit },
            StorageError::NotFound(name) => Self::NotFound(name),
            other => Self::StorageIo(other),
        }
    }
}

impl From<MetadataError> for EngineError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::NotFound(what) => Self::NotFound(what),
            MetadataError::DuplicateAlias { bucket, alias } => {
                Self::DuplicateAlias { bucket, alias }
            }
            other => Self::IndexIo(other),
        }
    }
}

impl From<filedrop_core::Error> for EngineError {
    fn from(e: filedrop_core::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
