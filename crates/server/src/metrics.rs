//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the fanout server:
//! - HTTP request metrics (latency, counts)
//! - Provider and latency-queue gauges (collected dynamically)
//! - Every search metric defined by `fanout_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fanout_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fanout_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "fanout_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Runtime Gauges
// =============================================================================

/// Registered providers.
pub static PROVIDERS_REGISTERED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("fanout_providers_registered", "Number of registered providers").unwrap()
});

/// Enabled providers.
pub static PROVIDERS_ENABLED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("fanout_providers_enabled", "Number of enabled providers").unwrap()
});

/// Providers currently inside a penalty window.
pub static PROVIDERS_PENALIZED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "fanout_providers_penalized",
        "Number of providers currently penalized",
    )
    .unwrap()
});

/// Latency samples waiting for the next flush.
pub static LATENCY_QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "fanout_latency_queue_depth",
        "Latency samples buffered in memory",
    )
    .unwrap()
});

/// Coalesced searches currently running.
pub static SEARCHES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "fanout_searches_in_flight",
        "Coalesced searches currently running",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Runtime
    registry
        .register(Box::new(PROVIDERS_REGISTERED.clone()))
        .unwrap();
    registry
        .register(Box::new(PROVIDERS_ENABLED.clone()))
        .unwrap();
    registry
        .register(Box::new(PROVIDERS_PENALIZED.clone()))
        .unwrap();
    registry
        .register(Box::new(LATENCY_QUEUE_DEPTH.clone()))
        .unwrap();
    registry
        .register(Box::new(SEARCHES_IN_FLIGHT.clone()))
        .unwrap();

    // Core metrics (searches, providers, timeouts, latency store)
    for metric in fanout_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the runtime at scrape time.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let registry = state.registry();
    let ids = registry.ids();
    let enabled = registry.enabled_ids().await;
    let (_, penalized) = state.tracker().partition(&ids);

    PROVIDERS_REGISTERED.set(ids.len() as i64);
    PROVIDERS_ENABLED.set(enabled.len() as i64);
    PROVIDERS_PENALIZED.set(penalized.len() as i64);
    LATENCY_QUEUE_DEPTH.set(state.runtime().latency().pending() as i64);
    SEARCHES_IN_FLIGHT.set(state.scatter().inflight_searches() as i64);
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let provider_regex = regex_lite::Regex::new(r"/providers/[^/]+").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = provider_regex.replace_all(&result, "/providers/{id}");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/searches/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/searches/{id}");
    }

    #[test]
    fn test_normalize_path_provider() {
        assert_eq!(
            normalize_path("/api/v1/providers/thepiratebay/enabled"),
            "/api/v1/providers/{id}/enabled"
        );
        assert_eq!(
            normalize_path("/api/v1/providers/1337x/reset"),
            "/api/v1/providers/{id}/reset"
        );
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/api/v1/providers"), "/api/v1/providers");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("fanout_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        fanout_core::metrics::COALESCED_REQUESTS.inc();
        fanout_core::metrics::SEARCHES
            .with_label_values(&["completed"])
            .inc();
        PROVIDERS_ENABLED.set(0);

        let output = encode_metrics();
        assert!(output.contains("fanout_coalesced_requests_total"));
        assert!(output.contains("fanout_searches_total"));
        assert!(output.contains("fanout_providers_enabled"));
    }
}
