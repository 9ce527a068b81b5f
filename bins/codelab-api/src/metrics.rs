// Prometheus metrics for the Codelab API

use codelab_common::types::{BatchOutcome, VerdictStatus};
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

lazy_static! {
    // Global registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Batches run (counter with language and outcome labels)
    pub static ref BATCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("codelab_batches_total", "Total number of execution batches run"),
        &["language", "outcome"]
    )
    .expect("metric can be created");

    // Test case verdicts (counter with verdict label)
    pub static ref VERDICTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("codelab_verdicts_total", "Total number of test case verdicts"),
        &["verdict"]
    )
    .expect("metric can be created");

    // Test cases that hit the poll deadline
    pub static ref POLL_TIMEOUTS: CounterVec = CounterVec::new(
        Opts::new("codelab_poll_timeouts_total", "Test cases unresolved at the batch deadline"),
        &["language"]
    )
    .expect("metric can be created");

    // Batch wall time histogram (in milliseconds)
    pub static ref BATCH_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "codelab_batch_duration_ms",
            "Batch wall time in milliseconds"
        )
        .buckets(vec![100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]),
        &["language"]
    )
    .expect("metric can be created");

    // Requests rejected before reaching the execution service
    pub static ref REQUESTS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("codelab_requests_rejected_total", "Total requests rejected by validation"),
        &["reason"]
    )
    .expect("metric can be created");

    // Execution service failures
    pub static ref UPSTREAM_FAILURES: CounterVec = CounterVec::new(
        Opts::new("codelab_upstream_failures_total", "Total failed batch submissions"),
        &["endpoint"]
    )
    .expect("metric can be created");
}

/// Initialize metrics registry
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(BATCHES_TOTAL.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(VERDICTS_TOTAL.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(POLL_TIMEOUTS.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(BATCH_DURATION.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(REQUESTS_REJECTED.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(UPSTREAM_FAILURES.clone()))
        .expect("collector can be registered");
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record a resolved batch
pub fn record_batch(language: &str, outcome: &BatchOutcome, duration_ms: f64) {
    let label = if outcome.all_passed { "passed" } else { "failed" };
    BATCHES_TOTAL.with_label_values(&[language, label]).inc();
    BATCH_DURATION.with_label_values(&[language]).observe(duration_ms);

    for verdict in &outcome.verdicts {
        let verdict_label = match verdict.status {
            VerdictStatus::Pass => "pass",
            VerdictStatus::Fail => "fail",
            VerdictStatus::Error => "error",
        };
        VERDICTS_TOTAL.with_label_values(&[verdict_label]).inc();
    }

    let timed_out = outcome.timed_out_count();
    if timed_out > 0 {
        POLL_TIMEOUTS
            .with_label_values(&[language])
            .inc_by(timed_out as f64);
    }
}

/// Record request rejection
pub fn record_rejected(reason: &str) {
    REQUESTS_REJECTED.with_label_values(&[reason]).inc();
}

/// Record a failed submission to the execution service
pub fn record_upstream_failure(endpoint: &str) {
    UPSTREAM_FAILURES.with_label_values(&[endpoint]).inc();
}
