//! Object registry for filedrop.
//!
//! This crate provides the record table behind every stored object:
//! - Insert with distinct duplicate-name and duplicate-alias errors
//! - Resolution by short code or `(bucket, alias)`
//! - Per-origin upload counts for rate limiting
//! - Expiry and oldest-first deletion for the eviction sweep

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{AliasKey, NewStoredObject, RateWindowCounts, StoredObjectRow};
pub use store::{MetadataStore, SqliteStore};

use filedrop_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
