//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
