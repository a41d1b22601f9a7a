use std::sync::Arc;

use fanout_core::{
    performance::PerformanceTracker, timeout::AdaptiveTimeoutEngine, Config, ProviderRegistry,
    SanitizedConfig, ScatterGather, ScatterRuntime,
};

/// Shared application state
pub struct AppState {
    runtime: Arc<ScatterRuntime>,
}

impl AppState {
    pub fn new(runtime: Arc<ScatterRuntime>) -> Self {
        Self { runtime }
    }

    pub fn config(&self) -> &Config {
        self.runtime.config()
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(self.config())
    }

    pub fn runtime(&self) -> &Arc<ScatterRuntime> {
        &self.runtime
    }

    pub fn scatter(&self) -> &Arc<ScatterGather> {
        self.runtime.scatter()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        self.runtime.registry()
    }

    pub fn tracker(&self) -> &PerformanceTracker {
        self.runtime.tracker()
    }

    pub fn timeouts(&self) -> &AdaptiveTimeoutEngine {
        self.runtime.timeouts()
    }
}
