//! Integration tests for age and capacity eviction.

mod common;

use common::{TestEngine, seeded_bytes};
use filedrop_core::config::MIB;
use filedrop_engine::EngineError;

const ORIGIN: &str = "192.0.2.44";
const HOUR: i64 = 3600;

#[tokio::test]
async fn test_expired_record_and_blob_removed() {
    let t = TestEngine::with_config(|c| c.limits.file_persistence_hours = 2).await;

    let old = t
        .engine
        .upload(&seeded_bytes(1, 300)[..], ORIGIN, None)
        .await
        .unwrap();
    t.age_records(2 * HOUR + 1).await;
    let fresh = t
        .engine
        .upload(&seeded_bytes(2, 300)[..], ORIGIN, None)
        .await
        .unwrap();

    let report = t.engine.run_eviction_sweep().await;
    assert_eq!(report.expired, vec![old.content_name.clone()]);
    assert!(report.evicted.is_empty());
    assert_eq!(report.blobs_removed, 1);
    assert_eq!(report.errors, 0);

    let err = t.engine.download(&old.locator.to_string()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    t.engine.download(&fresh.locator.to_string()).await.unwrap();
    assert_eq!(t.blob_count(), 1);
}

#[tokio::test]
async fn test_records_younger_than_persistence_kept() {
    let t = TestEngine::with_config(|c| c.limits.file_persistence_hours = 2).await;

    let receipt = t
        .engine
        .upload(&seeded_bytes(1, 300)[..], ORIGIN, None)
        .await
        .unwrap();
    t.age_records(HOUR).await;

    let report = t.engine.run_eviction_sweep().await;
    assert_eq!(report.records_removed(), 0);
    t.engine.download(&receipt.locator.to_string()).await.unwrap();
}

#[tokio::test]
async fn test_over_budget_evicts_oldest() {
    let t = TestEngine::with_config(|c| {
        c.limits.storage_size_limit_mb = 10;
        c.limits.file_size_limit_mb = 0;
    })
    .await;
    let nine_mb = (9 * MIB) as usize;

    let first = t
        .engine
        .upload(&seeded_bytes(1, nine_mb)[..], ORIGIN, None)
        .await
        .unwrap();
    assert_eq!(t.engine.run_eviction_sweep().await.records_removed(), 0);

    let second = t
        .engine
        .upload(&seeded_bytes(2, nine_mb)[..], ORIGIN, None)
        .await
        .unwrap();
    let report = t.engine.run_eviction_sweep().await;
    assert_eq!(report.evicted, vec![first.content_name.clone()]);

    let err = t
        .engine
        .download(&first.locator.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    let kept = t.engine.download(&second.locator.to_string()).await.unwrap();
    assert_eq!(kept.bytes.len(), nine_mb);
    assert_eq!(t.blob_count(), 1);
}

#[tokio::test]
async fn test_one_record_evicted_per_sweep() {
    let t = TestEngine::with_config(|c| {
        c.limits.storage_size_limit_mb = 1;
        c.limits.file_size_limit_mb = 0;
    })
    .await;
    let half_mb = (MIB / 2) as usize;

    for seed in 0..4 {
        t.engine
            .upload(&seeded_bytes(seed, half_mb)[..], ORIGIN, None)
            .await
            .unwrap();
    }

    assert_eq!(t.engine.run_eviction_sweep().await.evicted.len(), 1);
    assert_eq!(t.engine.run_eviction_sweep().await.evicted.len(), 1);
    // Two half-MiB blobs fit the budget exactly.
    assert_eq!(t.engine.run_eviction_sweep().await.evicted.len(), 0);
    assert_eq!(t.blob_count(), 2);
}

#[tokio::test]
async fn test_shared_blob_survives_partial_eviction() {
    let t = TestEngine::with_config(|c| c.limits.file_persistence_hours = 1).await;
    let data = seeded_bytes(8, 1024);

    let plain = t.engine.upload(&data[..], ORIGIN, None).await.unwrap();
    let aliased = t
        .engine
        .upload_to_bucket(&data[..], ORIGIN, "shared", "copy")
        .await
        .unwrap();
    assert_eq!(plain.content_name, aliased.content_name);

    t.age_record(plain.id, 2 * HOUR).await;
    let report = t.engine.run_eviction_sweep().await;
    assert_eq!(report.expired.len(), 1);
    assert_eq!(report.shared_blobs_kept, 1);
    assert_eq!(report.blobs_removed, 0);

    assert!(t.engine.download(&plain.locator.to_string()).await.is_err());
    let download = t
        .engine
        .download_from_bucket("shared", "copy")
        .await
        .unwrap();
    assert_eq!(download.bytes, data);
}

#[tokio::test]
async fn test_sweep_tolerates_missing_blob() {
    let t = TestEngine::with_config(|c| c.limits.file_persistence_hours = 1).await;

    let receipt = t
        .engine
        .upload(&seeded_bytes(3, 100)[..], ORIGIN, None)
        .await
        .unwrap();
    t.delete_blob_file(&receipt.content_name);
    t.age_records(2 * HOUR).await;

    let report = t.engine.run_eviction_sweep().await;
    assert_eq!(report.expired.len(), 1);
    assert_eq!(report.removal_failures, 0);
}

#[tokio::test]
async fn test_disabled_policies_do_nothing() {
    let t = TestEngine::with_config(|c| {
        c.limits.file_persistence_hours = 0;
        c.limits.storage_size_limit_mb = 0;
    })
    .await;

    t.engine
        .upload(&seeded_bytes(1, 100)[..], ORIGIN, None)
        .await
        .unwrap();
    t.age_records(365 * 24 * HOUR).await;

    let report = t.engine.run_eviction_sweep().await;
    assert_eq!(report.records_removed(), 0);
    assert_eq!(t.blob_count(), 1);
}

#[tokio::test]
async fn test_reupload_after_expiry_gets_new_locator() {
    let t = TestEngine::with_config(|c| c.limits.file_persistence_hours = 1).await;
    let data = seeded_bytes(11, 64);

    let first = t.engine.upload(&data[..], ORIGIN, None).await.unwrap();
    t.age_records(2 * HOUR).await;
    t.engine.run_eviction_sweep().await;

    let second = t.engine.upload(&data[..], ORIGIN, None).await.unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(first.content_name, second.content_name);
    t.engine.download(&second.locator.to_string()).await.unwrap();
}
