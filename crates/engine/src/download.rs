//! Download coordination. Reads never take the write lock.

use crate::error::{EngineError, EngineResult};
use crate::metrics;
use crate::state::Engine;
use bytes::Bytes;
use filedrop_core::Locator;
use filedrop_core::sniff::detect_content_type;
use filedrop_metadata::StoredObjectRow;
use filedrop_metadata::repos::ObjectRepo;

/// A resolved object and its bytes.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Bytes,
    /// Sniffed from the leading bytes, never from the stored name.
    pub content_type: &'static str,
    pub record: StoredObjectRow,
}

impl Engine {
    /// Fetch an object by short-code locator, e.g. `1c` or `1c.png`.
    ///
    /// The extension is cosmetic. Malformed codes, unknown ids and blobs that
    /// vanished or cannot be read are all `NotFound`.
    pub async fn download(&self, locator: &str) -> EngineResult<Download> {
        let result = self.download_short(locator).await;
        record_outcome(&result);
        result
    }

    /// Fetch an object by `(bucket, alias)`.
    pub async fn download_from_bucket(&self, bucket: &str, alias: &str) -> EngineResult<Download> {
        let result = async {
            let record = self.metadata.resolve_by_alias(bucket, alias).await?;
            self.fetch(record).await
        }
        .await;
        record_outcome(&result);
        result
    }

    async fn download_short(&self, locator: &str) -> EngineResult<Download> {
        let code = match Locator::parse_short(locator) {
            Ok(Locator::ShortCode { code, .. }) => code,
            _ => return Err(EngineError::NotFound(format!("locator {locator}"))),
        };
        let record = self.metadata.resolve_by_short_code(&self.codec, &code).await?;
        self.fetch(record).await
    }

    async fn fetch(&self, record: StoredObjectRow) -> EngineResult<Download> {
        // Any failure to read the blob of a resolved record is a miss.
        let bytes = self.content.get(&record.content_name).await.map_err(|e| {
            if e.is_not_found() {
                tracing::debug!(
                    id = record.id,
                    content_name = %record.content_name,
                    "Blob missing for resolved record"
                );
            } else {
                tracing::warn!(
                    id = record.id,
                    content_name = %record.content_name,
                    error = %e,
                    "Blob unreadable for resolved record"
                );
            }
            EngineError::NotFound(format!("object {}", record.id))
        })?;

        let content_type = detect_content_type(&bytes);
        tracing::debug!(id = record.id, size = bytes.len(), content_type, "Serving download");

        Ok(Download {
            bytes,
            content_type,
            record,
        })
    }
}

fn record_outcome(result: &EngineResult<Download>) {
    match result {
        Ok(_) => metrics::record_download("served"),
        Err(e) => metrics::record_download(e.code()),
    }
}
