//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Scatter-gather (searches, provider calls, coalescing, background jobs)
//! - Performance tracking (penalties)
//! - Adaptive timeouts (decisions by source)
//! - Latency store (flushes, dropped and pruned samples)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Scatter-Gather - Search Metrics
// =============================================================================

/// Searches total by final status.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fanout_searches_total", "Total scatter-gather searches"),
        &["status"], // "completed", "partial", "all_failed", "no_providers", "cancelled"
    )
    .unwrap()
});

/// End-to-end search duration in seconds.
pub static SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fanout_search_duration_seconds",
            "Duration of a scatter-gather search",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 45.0, 90.0]),
        &["status"],
    )
    .unwrap()
});

/// Requests that joined an already running identical search.
pub static COALESCED_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "fanout_coalesced_requests_total",
        "Searches served by an in-flight identical search",
    )
    .unwrap()
});

/// Background jobs by result.
pub static BACKGROUND_JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fanout_background_jobs_total", "Detached background jobs"),
        &["job", "result"], // result: "ok", "error", "cancelled"
    )
    .unwrap()
});

// =============================================================================
// Scatter-Gather - Provider Call Metrics
// =============================================================================

/// Provider calls by provider and outcome.
pub static PROVIDER_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fanout_provider_calls_total", "Total provider calls"),
        &["provider", "outcome"], // outcome: "success", "aborted", "timeout", "rate_limit", ...
    )
    .unwrap()
});

/// Provider call duration in seconds.
pub static PROVIDER_CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fanout_provider_call_duration_seconds",
            "Duration of provider calls",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 45.0]),
        &["provider"],
    )
    .unwrap()
});

/// Results returned per successful provider call.
pub static PROVIDER_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fanout_provider_results",
            "Number of results per provider call",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        &["provider"],
    )
    .unwrap()
});

// =============================================================================
// Performance Tracker
// =============================================================================

/// Penalties applied by provider and triggering error kind.
pub static PENALTIES_APPLIED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fanout_penalties_applied_total",
            "Provider penalties applied or extended",
        ),
        &["provider", "kind"],
    )
    .unwrap()
});

// =============================================================================
// Adaptive Timeouts
// =============================================================================

/// Timeout computations by source.
pub static TIMEOUT_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fanout_timeout_decisions_total",
            "Timeout budgets computed (cache misses)",
        ),
        &["source"], // "disabled", "fallback", "adaptive"
    )
    .unwrap()
});

// =============================================================================
// Latency Store
// =============================================================================

/// Flushes by result.
pub static LATENCY_FLUSHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fanout_latency_flushes_total", "Latency queue flushes"),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

/// Samples dropped by failed flushes.
pub static LATENCY_SAMPLES_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "fanout_latency_samples_dropped_total",
        "Latency samples lost to failed flushes",
    )
    .unwrap()
});

/// Samples deleted by retention pruning.
pub static LATENCY_SAMPLES_PRUNED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "fanout_latency_samples_pruned_total",
        "Latency samples deleted by retention pruning",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Searches
        Box::new(SEARCHES.clone()),
        Box::new(SEARCH_DURATION.clone()),
        Box::new(COALESCED_REQUESTS.clone()),
        Box::new(BACKGROUND_JOBS.clone()),
        // Provider calls
        Box::new(PROVIDER_CALLS.clone()),
        Box::new(PROVIDER_CALL_DURATION.clone()),
        Box::new(PROVIDER_RESULTS.clone()),
        // Performance
        Box::new(PENALTIES_APPLIED.clone()),
        // Timeouts
        Box::new(TIMEOUT_DECISIONS.clone()),
        // Latency store
        Box::new(LATENCY_FLUSHES.clone()),
        Box::new(LATENCY_SAMPLES_DROPPED.clone()),
        Box::new(LATENCY_SAMPLES_PRUNED.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_once() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        SEARCHES.with_label_values(&["completed"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "fanout_searches_total"));
    }
}
