use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::provider::{ProviderClass, ProviderId};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub scatter: ScatterConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Which backend stores latency samples.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseBackend {
    /// Embedded file-based store, for single-instance deployments.
    #[default]
    Sqlite,
    /// Relational server, for instances sharing latency history.
    Postgres,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseBackend,
    /// SQLite file path (backend = "sqlite").
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Connection URL (backend = "postgres").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Pool size (backend = "postgres").
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            path: default_db_path(),
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("fanout.db")
}

fn default_max_connections() -> u32 {
    5
}

/// Latency sample buffering and retention.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatencyConfig {
    /// Flush the write queue at least this often (milliseconds).
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,
    /// Flush early once the queue holds this many samples.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    /// Samples older than this are pruned (milliseconds).
    #[serde(default = "default_retention")]
    pub retention_ms: u64,
    /// How often the prune job runs (milliseconds).
    #[serde(default = "default_prune_interval")]
    pub prune_interval_ms: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval(),
            flush_threshold: default_flush_threshold(),
            retention_ms: default_retention(),
            prune_interval_ms: default_prune_interval(),
        }
    }
}

fn default_flush_interval() -> u64 {
    5_000
}

fn default_flush_threshold() -> usize {
    100
}

fn default_retention() -> u64 {
    24 * 60 * 60 * 1000 // 24 hours
}

fn default_prune_interval() -> u64 {
    60 * 60 * 1000 // 1 hour
}

/// Adaptive timeout engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    /// When disabled, every provider gets its class default.
    #[serde(default = "default_true")]
    pub adaptive_enabled: bool,
    /// Latency percentile the budget is derived from.
    #[serde(default = "default_percentile")]
    pub percentile: f64,
    /// Safety margin added on top of the percentile (0.25 = +25%).
    #[serde(default = "default_buffer")]
    pub p95_buffer: f64,
    /// Trailing window of samples considered (milliseconds).
    #[serde(default = "default_window")]
    pub window_ms: u64,
    /// Minimum number of success samples before trusting the percentile.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// How long a computed timeout is reused (milliseconds).
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_ms: u64,
    /// How often every provider's timeout is recomputed in the background.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            adaptive_enabled: true,
            percentile: default_percentile(),
            p95_buffer: default_buffer(),
            window_ms: default_window(),
            min_samples: default_min_samples(),
            cache_ttl_ms: default_cache_ttl(),
            refresh_interval_ms: default_refresh_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_percentile() -> f64 {
    95.0
}

fn default_buffer() -> f64 {
    0.25
}

fn default_window() -> u64 {
    60 * 60 * 1000 // 1 hour
}

fn default_min_samples() -> usize {
    10
}

fn default_cache_ttl() -> u64 {
    60_000
}

fn default_refresh_interval() -> u64 {
    60_000
}

/// Performance tracking and admission control.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Query at most this many providers when the caller made no selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    /// Skip providers scoring below this (0-100) when the caller made no selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<u32>,
    /// Mean success latency at which the score's latency penalty is fully applied.
    #[serde(default = "default_slow_threshold")]
    pub slow_threshold_ms: Option<u64>,
    /// Consecutive generic failures before a provider is penalized.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive rate-limit or server errors before a provider is penalized.
    #[serde(default = "default_fast_failure_threshold")]
    pub fast_failure_threshold: u32,
    /// First penalty duration; doubles with every further failure.
    #[serde(default = "default_base_penalty")]
    pub base_penalty_ms: u64,
    #[serde(default = "default_max_penalty")]
    pub max_penalty_ms: u64,
    /// Number of recent outcomes kept per provider for scoring.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Weight multiplier per step back in time (1.0 = no recency weighting).
    #[serde(default = "default_recency_decay")]
    pub recency_decay: f64,
    /// Fraction of the score the latency penalty can take away.
    #[serde(default = "default_latency_weight")]
    pub latency_weight: f64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_n: None,
            min_score: None,
            slow_threshold_ms: default_slow_threshold(),
            failure_threshold: default_failure_threshold(),
            fast_failure_threshold: default_fast_failure_threshold(),
            base_penalty_ms: default_base_penalty(),
            max_penalty_ms: default_max_penalty(),
            window_size: default_window_size(),
            recency_decay: default_recency_decay(),
            latency_weight: default_latency_weight(),
        }
    }
}

fn default_slow_threshold() -> Option<u64> {
    Some(5_000)
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_fast_failure_threshold() -> u32 {
    1
}

fn default_base_penalty() -> u64 {
    30_000
}

fn default_max_penalty() -> u64 {
    10 * 60 * 1000 // 10 minutes
}

fn default_window_size() -> usize {
    20
}

fn default_recency_decay() -> f64 {
    0.85
}

fn default_latency_weight() -> f64 {
    0.25
}

/// Scatter-gather orchestration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScatterConfig {
    /// Providers queried by default while no performance data exists.
    #[serde(default)]
    pub default_providers: Vec<String>,
    /// Tasks still running at `budget * factor` are cut off as timeouts.
    #[serde(default = "default_hard_deadline_factor")]
    pub hard_deadline_factor: f64,
    /// Empty results at or beyond this fraction of the budget count as a timeout.
    #[serde(default = "default_silent_timeout_ratio")]
    pub silent_timeout_ratio: f64,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            default_providers: Vec::new(),
            hard_deadline_factor: default_hard_deadline_factor(),
            silent_timeout_ratio: default_silent_timeout_ratio(),
        }
    }
}

fn default_hard_deadline_factor() -> f64 {
    2.0
}

fn default_silent_timeout_ratio() -> f64 {
    0.9
}

/// Provider wiring.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    /// Per-provider class overrides (provider name -> class).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub classes: HashMap<ProviderId, ProviderClass>,
    /// Jackett indexers exposed as providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jackett: Option<JackettConfig>,
}

impl ProvidersConfig {
    /// Class overrides, including the ones declared on Jackett indexers.
    pub fn class_overrides(&self) -> HashMap<ProviderId, ProviderClass> {
        let mut overrides = self.classes.clone();
        if let Some(jackett) = &self.jackett {
            for indexer in &jackett.indexers {
                if let Some(class) = indexer.class {
                    overrides.insert(ProviderId::normalize(&indexer.name), class);
                }
            }
        }
        overrides
    }
}

/// Jackett configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    /// Jackett API key
    pub api_key: String,
    #[serde(default)]
    pub indexers: Vec<JackettIndexerConfig>,
}

/// One Jackett indexer exposed as a provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettIndexerConfig {
    /// Jackett indexer id (e.g., "yts").
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<ProviderClass>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: SanitizedDatabaseConfig,
    pub latency: LatencyConfig,
    pub timeouts: TimeoutConfig,
    pub performance: PerformanceConfig,
    pub scatter: ScatterConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jackett: Option<SanitizedJackettConfig>,
}

/// Sanitized database config (connection URL hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDatabaseConfig {
    pub backend: DatabaseBackend,
    pub path: PathBuf,
    pub url_configured: bool,
}

/// Sanitized Jackett config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedJackettConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub indexers: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: SanitizedDatabaseConfig {
                backend: config.database.backend,
                path: config.database.path.clone(),
                url_configured: config.database.url.is_some(),
            },
            latency: config.latency.clone(),
            timeouts: config.timeouts.clone(),
            performance: config.performance.clone(),
            scatter: config.scatter.clone(),
            jackett: config
                .providers
                .jackett
                .as_ref()
                .map(|j| SanitizedJackettConfig {
                    url: j.url.clone(),
                    api_key_configured: !j.api_key.is_empty(),
                    indexers: j.indexers.iter().map(|i| i.name.clone()).collect(),
                }),
        }
    }
}
