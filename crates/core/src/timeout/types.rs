use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::config::TimeoutConfig;
use crate::provider::{ProviderClass, ProviderId, TimeoutBounds};

/// Inputs the timeout budget is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeoutParams {
    pub adaptive_enabled: bool,
    pub percentile: f64,
    pub buffer: f64,
    pub window_ms: u64,
    pub min_samples: usize,
}

impl TimeoutParams {
    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self {
            adaptive_enabled: config.adaptive_enabled,
            percentile: config.percentile,
            buffer: config.p95_buffer,
            window_ms: config.window_ms,
            min_samples: config.min_samples,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Where a timeout value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutSource {
    /// Adaptive timeouts are off; class default.
    Disabled,
    /// Not enough samples in the window; class default.
    Fallback,
    /// Derived from the latency percentile.
    Adaptive,
}

impl TimeoutSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutSource::Disabled => "disabled",
            TimeoutSource::Fallback => "fallback",
            TimeoutSource::Adaptive => "adaptive",
        }
    }
}

/// A computed timeout budget for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct TimeoutDecision {
    pub provider: ProviderId,
    pub class: ProviderClass,
    pub timeout_ms: u64,
    pub source: TimeoutSource,
    /// Observed percentile latency, when the decision is adaptive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile_ms: Option<u64>,
    pub computed_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) params: TimeoutParams,
    #[serde(skip)]
    pub(crate) computed: Instant,
}

impl TimeoutDecision {
    pub(crate) fn new(
        provider: ProviderId,
        class: ProviderClass,
        timeout_ms: u64,
        source: TimeoutSource,
        percentile_ms: Option<u64>,
        params: TimeoutParams,
    ) -> Self {
        Self {
            provider,
            class,
            timeout_ms,
            source,
            percentile_ms,
            computed_at: Utc::now(),
            params,
            computed: Instant::now(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn is_fresh(&self, ttl: Duration, params: &TimeoutParams) -> bool {
        self.computed.elapsed() < ttl && &self.params == params
    }
}

/// `round(percentile * (1 + buffer))`, clamped into the class bounds.
pub fn compute_timeout(percentile_ms: u64, buffer: f64, bounds: &TimeoutBounds) -> u64 {
    let raw = (percentile_ms as f64 * (1.0 + buffer.max(0.0))).round();
    let raw = if raw.is_finite() { raw as u64 } else { bounds.max_ms };
    bounds.clamp(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_timeout_applies_buffer() {
        let bounds = ProviderClass::HttpScraping.bounds();
        assert_eq!(compute_timeout(4_000, 0.25, &bounds), 5_000);
        assert_eq!(compute_timeout(3_333, 0.5, &bounds), 5_000); // 4999.5 rounds up
    }

    #[test]
    fn test_compute_timeout_is_clamped() {
        let bounds = ProviderClass::HttpScraping.bounds();
        assert_eq!(compute_timeout(100, 0.25, &bounds), bounds.min_ms);
        assert_eq!(compute_timeout(20_000, 0.25, &bounds), bounds.max_ms);
        assert_eq!(compute_timeout(u64::MAX, 0.25, &bounds), bounds.max_ms);
    }

    #[test]
    fn test_freshness_depends_on_params() {
        let params = TimeoutParams::from_config(&TimeoutConfig::default());
        let decision = TimeoutDecision::new(
            ProviderId::from("yts"),
            ProviderClass::HttpScraping,
            8_000,
            TimeoutSource::Fallback,
            None,
            params,
        );
        assert!(decision.is_fresh(Duration::from_secs(60), &params));
        assert!(!decision.is_fresh(Duration::ZERO, &params));

        let other = TimeoutParams {
            buffer: 0.5,
            ..params
        };
        assert!(!decision.is_fresh(Duration::from_secs(60), &other));
    }
}
