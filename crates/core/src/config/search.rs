//! Per-request search configuration.

use serde::{Deserialize, Serialize};

use crate::timeout::TimeoutParams;

use super::Config;

/// Optional per-request (or per-user) overrides of the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adaptive_timeout_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_buffer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_window_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_samples: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perf_tracking_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_threshold_ms: Option<u64>,
}

impl SearchOverrides {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Search settings after applying request > user > configured default precedence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSearchConfig {
    pub adaptive_timeout_enabled: bool,
    pub p95_buffer: f64,
    pub timeout_window_ms: u64,
    pub min_samples: usize,
    pub perf_tracking_enabled: bool,
    pub top_n: Option<usize>,
    pub min_score: Option<u32>,
    pub slow_threshold_ms: Option<u64>,
}

impl ResolvedSearchConfig {
    /// Resolve settings for one request.
    pub fn resolve(
        config: &Config,
        user: Option<&SearchOverrides>,
        request: &SearchOverrides,
    ) -> Self {
        let none = SearchOverrides::default();
        let user = user.unwrap_or(&none);

        Self {
            adaptive_timeout_enabled: request
                .adaptive_timeout_enabled
                .or(user.adaptive_timeout_enabled)
                .unwrap_or(config.timeouts.adaptive_enabled),
            p95_buffer: request
                .p95_buffer
                .or(user.p95_buffer)
                .unwrap_or(config.timeouts.p95_buffer),
            timeout_window_ms: request
                .timeout_window_ms
                .or(user.timeout_window_ms)
                .unwrap_or(config.timeouts.window_ms),
            min_samples: request
                .min_samples
                .or(user.min_samples)
                .unwrap_or(config.timeouts.min_samples),
            perf_tracking_enabled: request
                .perf_tracking_enabled
                .or(user.perf_tracking_enabled)
                .unwrap_or(config.performance.enabled),
            top_n: request.top_n.or(user.top_n).or(config.performance.top_n),
            min_score: request
                .min_score
                .or(user.min_score)
                .or(config.performance.min_score),
            slow_threshold_ms: request
                .slow_threshold_ms
                .or(user.slow_threshold_ms)
                .or(config.performance.slow_threshold_ms),
        }
    }

    /// Settings with no overrides applied.
    pub fn from_config(config: &Config) -> Self {
        Self::resolve(config, None, &SearchOverrides::default())
    }

    /// Parameters the timeout engine computes a budget from.
    pub fn timeout_params(&self, config: &Config) -> TimeoutParams {
        TimeoutParams {
            adaptive_enabled: self.adaptive_timeout_enabled,
            percentile: config.timeouts.percentile,
            buffer: self.p95_buffer,
            window_ms: self.timeout_window_ms,
            min_samples: self.min_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_come_from_config() {
        let mut config = Config::default();
        config.performance.top_n = Some(5);

        let resolved = ResolvedSearchConfig::from_config(&config);
        assert!(resolved.adaptive_timeout_enabled);
        assert_eq!(resolved.p95_buffer, 0.25);
        assert_eq!(resolved.timeout_window_ms, 3_600_000);
        assert_eq!(resolved.min_samples, 10);
        assert!(resolved.perf_tracking_enabled);
        assert_eq!(resolved.top_n, Some(5));
        assert_eq!(resolved.min_score, None);
        assert_eq!(resolved.slow_threshold_ms, Some(5_000));
    }

    #[test]
    fn test_request_beats_user_beats_config() {
        let config = Config::default();
        let user = SearchOverrides {
            p95_buffer: Some(0.5),
            min_samples: Some(20),
            top_n: Some(3),
            ..Default::default()
        };
        let request = SearchOverrides {
            p95_buffer: Some(0.1),
            ..Default::default()
        };

        let resolved = ResolvedSearchConfig::resolve(&config, Some(&user), &request);
        assert_eq!(resolved.p95_buffer, 0.1); // request
        assert_eq!(resolved.min_samples, 20); // user
        assert_eq!(resolved.top_n, Some(3)); // user
        assert_eq!(resolved.timeout_window_ms, 3_600_000); // config
    }

    #[test]
    fn test_timeout_params() {
        let config = Config::default();
        let request = SearchOverrides {
            adaptive_timeout_enabled: Some(false),
            ..Default::default()
        };
        let params =
            ResolvedSearchConfig::resolve(&config, None, &request).timeout_params(&config);
        assert!(!params.adaptive_enabled);
        assert_eq!(params.percentile, 95.0);
        assert_eq!(params.buffer, 0.25);
    }

    #[test]
    fn test_overrides_deserialize_partially() {
        let overrides: SearchOverrides =
            serde_json::from_str(r#"{"top_n": 2, "perf_tracking_enabled": false}"#).unwrap();
        assert_eq!(overrides.top_n, Some(2));
        assert_eq!(overrides.perf_tracking_enabled, Some(false));
        assert!(overrides.p95_buffer.is_none());
        assert!(!overrides.is_empty());
        assert!(SearchOverrides::default().is_empty());
    }
}
