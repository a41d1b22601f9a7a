pub mod config;
pub mod latency;
pub mod metrics;
pub mod performance;
pub mod provider;
pub mod runtime;
pub mod scatter;
pub mod testing;
pub mod timeout;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError,
    ResolvedSearchConfig, SanitizedConfig, SearchOverrides,
};
pub use latency::{LatencyBackend, LatencyError, LatencySample, LatencyStore};
pub use performance::{PerformanceTracker, ProviderHealth};
pub use provider::{
    ErrorKind, Provider, ProviderClass, ProviderError, ProviderId, ProviderRegistry,
    ResultRecord,
};
pub use runtime::{RuntimeError, ScatterRuntime};
pub use scatter::{
    AdmissionMode, BackgroundScheduler, PostSearchHook, ScatterGather, ScatterResult,
    SearchRequest, SearchStatus, TaskSummary,
};
pub use timeout::{AdaptiveTimeoutEngine, TimeoutDecision, TimeoutSource};
