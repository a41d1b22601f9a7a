use super::{types::Config, ConfigError, DatabaseBackend};

/// Longest accepted latency retention (3650 days).
pub const MAX_RETENTION_MS: u64 = 3_650 * 24 * 60 * 60 * 1_000;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Postgres backend has a connection URL
/// - Timeout percentile, buffer and sample count are usable
/// - Latency flush threshold and intervals are positive
/// - Latency retention is positive and bounded
/// - Penalty bounds are ordered
/// - Hard deadline factor is at least 1
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return invalid("server.port cannot be 0");
    }

    // Database validation
    if config.database.backend == DatabaseBackend::Postgres {
        match &config.database.url {
            Some(url) if !url.trim().is_empty() => {}
            _ => return invalid("database.url is required when database.backend = \"postgres\""),
        }
        if config.database.max_connections == 0 {
            return invalid("database.max_connections must be at least 1");
        }
    }

    // Timeout validation
    let timeouts = &config.timeouts;
    if !(timeouts.percentile > 0.0 && timeouts.percentile <= 100.0) {
        return invalid("timeouts.percentile must be in (0, 100]");
    }
    if !(timeouts.p95_buffer >= 0.0) {
        return invalid("timeouts.p95_buffer cannot be negative");
    }
    if timeouts.min_samples == 0 {
        return invalid("timeouts.min_samples must be at least 1");
    }
    if timeouts.window_ms == 0 || timeouts.refresh_interval_ms == 0 {
        return invalid("timeouts.window_ms and timeouts.refresh_interval_ms must be positive");
    }

    // Latency store validation
    let latency = &config.latency;
    if latency.flush_threshold == 0 {
        return invalid("latency.flush_threshold must be at least 1");
    }
    if latency.flush_interval_ms == 0 || latency.prune_interval_ms == 0 {
        return invalid("latency.flush_interval_ms and latency.prune_interval_ms must be positive");
    }
    if latency.retention_ms == 0 || latency.retention_ms > MAX_RETENTION_MS {
        return invalid("latency.retention_ms must be between 1 ms and 3650 days");
    }

    // Performance validation
    let performance = &config.performance;
    if performance.failure_threshold == 0 || performance.fast_failure_threshold == 0 {
        return invalid("performance failure thresholds must be at least 1");
    }
    if performance.base_penalty_ms > performance.max_penalty_ms {
        return invalid("performance.base_penalty_ms cannot exceed performance.max_penalty_ms");
    }
    if performance.window_size == 0 {
        return invalid("performance.window_size must be at least 1");
    }
    if performance.min_score.is_some_and(|s| s > 100) {
        return invalid("performance.min_score must be between 0 and 100");
    }
    if !(performance.recency_decay > 0.0 && performance.recency_decay <= 1.0) {
        return invalid("performance.recency_decay must be in (0, 1]");
    }
    if !(0.0..=1.0).contains(&performance.latency_weight) {
        return invalid("performance.latency_weight must be in [0, 1]");
    }

    // Scatter validation
    if !(config.scatter.hard_deadline_factor >= 1.0) {
        return invalid("scatter.hard_deadline_factor must be at least 1.0");
    }
    if !(config.scatter.silent_timeout_ratio > 0.0 && config.scatter.silent_timeout_ratio <= 1.0) {
        return invalid("scatter.silent_timeout_ratio must be in (0, 1]");
    }

    // Jackett validation
    if let Some(jackett) = &config.providers.jackett {
        if jackett.url.trim().is_empty() {
            return invalid("providers.jackett.url cannot be empty");
        }
        if jackett.indexers.iter().any(|i| i.name.trim().is_empty()) {
            return invalid("providers.jackett.indexers entries need a name");
        }
    }

    Ok(())
}

fn invalid(message: &str) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JackettConfig, ServerConfig};
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_postgres_requires_url() {
        let mut config = Config::default();
        config.database.backend = DatabaseBackend::Postgres;
        assert!(validate_config(&config).is_err());

        config.database.url = Some("postgres://localhost/fanout".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_timeout_settings() {
        let mut config = Config::default();
        config.timeouts.min_samples = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.timeouts.p95_buffer = -0.1;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.timeouts.percentile = 0.0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.timeouts.percentile = 100.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_penalty_bounds() {
        let mut config = Config::default();
        config.performance.base_penalty_ms = 60_000;
        config.performance.max_penalty_ms = 30_000;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_min_score_range() {
        let mut config = Config::default();
        config.performance.min_score = Some(101);
        assert!(validate_config(&config).is_err());

        config.performance.min_score = Some(100);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_flush_threshold() {
        let mut config = Config::default();
        config.latency.flush_threshold = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_retention_range() {
        let mut config = Config::default();
        config.latency.retention_ms = 0;
        assert!(validate_config(&config).is_err());

        config.latency.retention_ms = u64::MAX;
        assert!(validate_config(&config).is_err());

        config.latency.retention_ms = MAX_RETENTION_MS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_hard_deadline_factor() {
        let mut config = Config::default();
        config.scatter.hard_deadline_factor = 0.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_jackett_url() {
        let mut config = Config::default();
        config.providers.jackett = Some(JackettConfig {
            url: "".to_string(),
            api_key: "key".to_string(),
            indexers: vec![],
        });
        assert!(validate_config(&config).is_err());
    }
}
