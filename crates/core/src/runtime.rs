//! Process-wide owner of the search components.
//!
//! Builds the latency store, timeout engine, performance tracker, provider
//! registry and orchestrator from configuration, runs their background loops,
//! and tears them down in order.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::config::Config;
use crate::latency::{create_latency_backend, LatencyBackend, LatencyError, LatencyStore};
use crate::performance::PerformanceTracker;
use crate::provider::{jackett_providers, ProviderClassTable, ProviderError, ProviderRegistry};
use crate::scatter::{PostSearchHook, ScatterGather};
use crate::timeout::AdaptiveTimeoutEngine;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to open latency store: {0}")]
    Latency(#[from] LatencyError),

    #[error("Failed to create providers: {0}")]
    Provider(#[from] ProviderError),
}

pub struct ScatterRuntime {
    config: Arc<Config>,
    registry: Arc<ProviderRegistry>,
    tracker: Arc<PerformanceTracker>,
    timeouts: Arc<AdaptiveTimeoutEngine>,
    latency: Arc<LatencyStore>,
    scatter: Arc<ScatterGather>,
    shutdown: CancellationToken,
    loops: TaskTracker,
}

impl ScatterRuntime {
    /// Open the configured latency backend and register the configured providers.
    pub async fn build(config: Config) -> Result<Self, RuntimeError> {
        let backend = create_latency_backend(&config.database).await?;
        info!(backend = backend.name(), "Latency store opened");

        let mut registry =
            ProviderRegistry::new(ProviderClassTable::new(&config.providers.class_overrides()));
        if let Some(jackett) = &config.providers.jackett {
            for (provider, enabled) in jackett_providers(jackett)? {
                registry = registry.register(Arc::new(provider), enabled);
            }
            info!(
                url = %jackett.url,
                indexers = jackett.indexers.len(),
                "Jackett providers registered"
            );
        }
        if registry.is_empty() {
            info!("No providers configured");
        }

        Ok(Self::from_parts(config, backend, registry, None))
    }

    /// Assemble a runtime from an already opened backend and registry.
    pub fn from_parts(
        config: Config,
        backend: Arc<dyn LatencyBackend>,
        registry: ProviderRegistry,
        hook: Option<Arc<dyn PostSearchHook>>,
    ) -> Self {
        let config = Arc::new(config);
        let shutdown = CancellationToken::new();
        let registry = Arc::new(registry);

        let latency = Arc::new(LatencyStore::new(backend, config.latency.clone()));
        let tracker = Arc::new(PerformanceTracker::new(config.performance.clone()));
        let timeouts = Arc::new(AdaptiveTimeoutEngine::new(
            Arc::clone(&latency),
            registry.classes().clone(),
            &config.timeouts,
        ));

        let mut scatter = ScatterGather::new(
            Arc::clone(&config),
            Arc::clone(&registry),
            Arc::clone(&tracker),
            Arc::clone(&timeouts),
            Arc::clone(&latency),
            shutdown.clone(),
        );
        if let Some(hook) = hook {
            scatter = scatter.with_post_search_hook(hook);
        }

        Self {
            config,
            registry,
            tracker,
            timeouts,
            latency,
            scatter: Arc::new(scatter),
            shutdown,
            loops: TaskTracker::new(),
        }
    }

    /// Spawn the latency flush, latency prune and timeout refresh loops.
    pub fn start(&self) {
        self.loops.spawn(
            Arc::clone(&self.latency).run_flush_loop(self.shutdown.child_token()),
        );
        self.loops.spawn(
            Arc::clone(&self.latency).run_prune_loop(self.shutdown.child_token()),
        );
        self.loops.spawn(Arc::clone(&self.timeouts).run_refresh_loop(
            self.registry.ids(),
            self.shutdown.child_token(),
        ));

        info!(
            providers = self.registry.len(),
            backend = self.latency.backend_name(),
            "Scatter runtime started"
        );
    }

    /// Cancel everything, wait for the loops and jobs, then flush what is left.
    pub async fn shutdown(&self) {
        info!("Stopping scatter runtime...");
        self.shutdown.cancel();

        self.loops.close();
        self.loops.wait().await;
        self.scatter.background().wait().await;

        let flushed = self.latency.flush().await;
        info!(flushed, "Scatter runtime stopped");
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    pub fn timeouts(&self) -> &Arc<AdaptiveTimeoutEngine> {
        &self.timeouts
    }

    pub fn latency(&self) -> &Arc<LatencyStore> {
        &self.latency
    }

    pub fn scatter(&self) -> &Arc<ScatterGather> {
        &self.scatter
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, JackettConfig, JackettIndexerConfig};
    use crate::latency::SqliteLatencyBackend;
    use crate::provider::ProviderId;
    use crate::scatter::{SearchRequest, SearchStatus};
    use crate::testing::{fixtures, MockProvider};
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_registers_jackett_indexers() {
        let dir = TempDir::new().unwrap();
        let mut config = Config {
            database: DatabaseConfig {
                path: dir.path().join("fanout.db"),
                ..Default::default()
            },
            ..Default::default()
        };
        config.providers.jackett = Some(JackettConfig {
            url: "http://localhost:9117".to_string(),
            api_key: "secret".to_string(),
            indexers: vec![
                JackettIndexerConfig {
                    name: "1337x".to_string(),
                    enabled: true,
                    class: None,
                },
                JackettIndexerConfig {
                    name: "nyaasi".to_string(),
                    enabled: false,
                    class: None,
                },
            ],
        });

        let runtime = ScatterRuntime::build(config).await.unwrap();
        assert_eq!(runtime.registry().len(), 2);
        assert_eq!(
            runtime.registry().enabled_ids().await,
            vec![ProviderId::from("1337x")]
        );
        assert_eq!(runtime.latency().backend_name(), "sqlite");
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending_samples() {
        let backend = Arc::new(SqliteLatencyBackend::in_memory().unwrap());
        let provider = MockProvider::new("Alpha").with_results(fixtures::result_records("a", 2));
        let registry = ProviderRegistry::new(ProviderClassTable::default())
            .register(Arc::new(provider.clone()), true);

        let runtime = ScatterRuntime::from_parts(
            Config::default(),
            Arc::clone(&backend) as Arc<dyn LatencyBackend>,
            registry,
            None,
        );
        runtime.start();

        let result = runtime
            .scatter()
            .search(&SearchRequest::new("ubuntu"), &CancellationToken::new())
            .await;
        assert_eq!(result.status, SearchStatus::Completed);

        tokio::time::timeout(Duration::from_secs(5), runtime.shutdown())
            .await
            .expect("shutdown should not hang");

        assert_eq!(runtime.latency().pending(), 0);
        assert_eq!(backend.count().unwrap(), 1);
        assert!(runtime.shutdown_token().is_cancelled());
    }
}
