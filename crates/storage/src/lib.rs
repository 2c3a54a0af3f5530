//! Blob storage for filedrop.
//!
//! This crate provides:
//! - An object store abstraction with a local filesystem backend
//! - A content-addressed store that names blobs by their SHA-256 digest and
//!   enforces the upload size ceiling while streaming

pub mod backends;
pub mod content;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use content::{ContentStore, StagedBlob, StoredBlob};
pub use error::{StorageError, StorageResult};
pub use traits::{ObjectMeta, ObjectStore};

use filedrop_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}
