//! Prometheus metrics for the filedrop engine.
//!
//! Metrics carry no origins, names or locators; only aggregate counts.
//! Eviction failures are counted here rather than surfaced to callers.

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Upload metrics
pub static UPLOADS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "filedrop_uploads_total",
            "Upload attempts by outcome (stored, duplicate, or an error code)",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static BYTES_STORED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "filedrop_bytes_stored_total",
        "Bytes of newly written blobs",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "filedrop_upload_duration_seconds",
            "Time spent inside the upload critical section",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
    )
    .expect("metric creation failed")
});

// Download metrics
pub static DOWNLOADS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("filedrop_downloads_total", "Download attempts by outcome"),
        &["outcome"],
    )
    .expect("metric creation failed")
});

// Eviction metrics
pub static EVICTION_SWEEPS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "filedrop_eviction_sweeps_total",
        "Total number of eviction sweeps run",
    )
    .expect("metric creation failed")
});

pub static EVICTED_OBJECTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "filedrop_evicted_objects_total",
            "Records removed by the eviction sweep, by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static EVICTION_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "filedrop_eviction_errors_total",
            "Eviction failures that were logged and skipped, by stage",
        ),
        &["stage"],
    )
    .expect("metric creation failed")
});

pub static SWEEP_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "filedrop_sweep_duration_seconds",
            "Time taken by one eviction sweep",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(UPLOADS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_STORED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DOWNLOADS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(EVICTION_SWEEPS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(EVICTED_OBJECTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(EVICTION_ERRORS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_DURATION.clone()))
            .expect("metric registration failed");
    });
}

/// Render the registry in the Prometheus text exposition format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_upload(outcome: &str) {
    UPLOADS.with_label_values(&[outcome]).inc();
}

pub fn record_download(outcome: &str) {
    DOWNLOADS.with_label_values(&[outcome]).inc();
}

pub fn record_eviction(reason: &str, count: usize) {
    EVICTED_OBJECTS
        .with_label_values(&[reason])
        .inc_by(count as u64);
}

pub fn record_eviction_error(stage: &str) {
    EVICTION_ERRORS.with_label_values(&[stage]).inc();
}
