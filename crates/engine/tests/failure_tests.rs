//! Integration tests for storage and index failures on the write path.

mod common;

use common::{TestEngine, seeded_bytes};
use filedrop_engine::EngineError;
use filedrop_metadata::repos::ObjectRepo;

const ORIGIN: &str = "198.51.100.3";
const HOUR: i64 = 3600;

async fn drop_objects_table(t: &TestEngine) {
    sqlx::query("DROP TABLE objects")
        .execute(t.pool())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_blob_write_failure_leaves_no_record() {
    let (t, backend) = TestEngine::with_flaky_backend(|_| {}).await;
    backend.fail_writes(true);

    let err = t
        .engine
        .upload(&seeded_bytes(1, 100)[..], ORIGIN, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StorageIo(_)));
    assert!(!err.is_client_error());
    assert_eq!(t.engine.metadata().count_objects().await.unwrap(), 0);
    assert_eq!(t.blob_count(), 0);

    backend.fail_writes(false);
    t.engine
        .upload(&seeded_bytes(1, 100)[..], ORIGIN, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_index_failure_rolls_back_new_blob() {
    let t = TestEngine::new().await;
    drop_objects_table(&t).await;

    let err = t
        .engine
        .upload(&seeded_bytes(2, 100)[..], ORIGIN, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::IndexIo(_)));
    assert_eq!(t.blob_count(), 0);
}

#[tokio::test]
async fn test_blob_removal_failure_does_not_fail_sweep() {
    let (t, backend) =
        TestEngine::with_flaky_backend(|c| c.limits.file_persistence_hours = 1).await;

    let receipt = t
        .engine
        .upload(&seeded_bytes(3, 100)[..], ORIGIN, None)
        .await
        .unwrap();
    t.age_records(2 * HOUR).await;
    backend.fail_deletes(true);

    let report = t.engine.run_eviction_sweep().await;
    assert_eq!(report.expired, vec![receipt.content_name]);
    assert_eq!(report.removal_failures, 1);
    assert_eq!(report.blobs_removed, 0);

    // The record is gone even though its blob is stranded.
    let err = t.engine.download(&receipt.short_code).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert_eq!(t.blob_count(), 1);
}

#[tokio::test]
async fn test_index_failure_during_sweep_is_reported() {
    let t = TestEngine::with_config(|c| {
        c.limits.file_persistence_hours = 1;
        c.limits.storage_size_limit_mb = 1;
    })
    .await;
    t.engine
        .upload(&seeded_bytes(4, 2 * 1024 * 1024)[..], ORIGIN, None)
        .await
        .unwrap();
    drop_objects_table(&t).await;

    let report = t.engine.run_eviction_sweep().await;
    // Both the expiry step and the capacity step hit the missing table.
    assert_eq!(report.errors, 2);
    assert_eq!(report.records_removed(), 0);
    assert_eq!(t.blob_count(), 1);
}
