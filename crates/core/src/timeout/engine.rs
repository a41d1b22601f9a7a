use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::TimeoutConfig;
use crate::latency::LatencyStore;
use crate::metrics::TIMEOUT_DECISIONS;
use crate::provider::{ProviderClassTable, ProviderId};

use super::{compute_timeout, TimeoutDecision, TimeoutParams, TimeoutSource};

/// Per-provider timeout budgets derived from observed latency.
///
/// Computed values are memoized for `cache_ttl`; concurrent computations for
/// the same provider are harmless (last write wins).
pub struct AdaptiveTimeoutEngine {
    store: Arc<LatencyStore>,
    classes: ProviderClassTable,
    defaults: TimeoutParams,
    cache_ttl: Duration,
    refresh_interval: Duration,
    cache: RwLock<HashMap<ProviderId, TimeoutDecision>>,
}

impl AdaptiveTimeoutEngine {
    pub fn new(store: Arc<LatencyStore>, classes: ProviderClassTable, config: &TimeoutConfig) -> Self {
        Self {
            store,
            classes,
            defaults: TimeoutParams::from_config(config),
            cache_ttl: Duration::from_millis(config.cache_ttl_ms),
            refresh_interval: Duration::from_millis(config.refresh_interval_ms),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Parameters from static configuration, used by the background refresh.
    pub fn default_params(&self) -> TimeoutParams {
        self.defaults
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<ProviderId, TimeoutDecision>> {
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<ProviderId, TimeoutDecision>> {
        self.cache.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Current timeout budget for `provider`.
    pub async fn get_timeout(&self, provider: &ProviderId, params: &TimeoutParams) -> Duration {
        self.decide(provider, params).await.timeout()
    }

    /// Full decision behind [`Self::get_timeout`].
    pub async fn decide(&self, provider: &ProviderId, params: &TimeoutParams) -> TimeoutDecision {
        let class = self.classes.class_of(provider);

        if !params.adaptive_enabled {
            TIMEOUT_DECISIONS
                .with_label_values(&[TimeoutSource::Disabled.as_str()])
                .inc();
            return TimeoutDecision::new(
                provider.clone(),
                class,
                class.bounds().default_ms,
                TimeoutSource::Disabled,
                None,
                *params,
            );
        }

        let cached = self
            .read_cache()
            .get(provider)
            .filter(|d| d.is_fresh(self.cache_ttl, params))
            .cloned();
        if let Some(cached) = cached {
            return cached;
        }

        self.compute(provider, params).await
    }

    /// Compute, cache and return a fresh decision, ignoring the cache.
    async fn compute(&self, provider: &ProviderId, params: &TimeoutParams) -> TimeoutDecision {
        let class = self.classes.class_of(provider);
        let bounds = class.bounds();

        let observed = self
            .store
            .percentile(provider, params.percentile, params.window(), params.min_samples)
            .await;

        let decision = match observed {
            Some(percentile_ms) => TimeoutDecision::new(
                provider.clone(),
                class,
                compute_timeout(percentile_ms, params.buffer, &bounds),
                TimeoutSource::Adaptive,
                Some(percentile_ms),
                *params,
            ),
            None => TimeoutDecision::new(
                provider.clone(),
                class,
                bounds.default_ms,
                TimeoutSource::Fallback,
                None,
                *params,
            ),
        };

        TIMEOUT_DECISIONS
            .with_label_values(&[decision.source.as_str()])
            .inc();
        debug!(
            provider = %provider,
            class = class.as_str(),
            timeout_ms = decision.timeout_ms,
            percentile_ms = ?decision.percentile_ms,
            source = decision.source.as_str(),
            "Computed timeout"
        );

        self.write_cache().insert(provider.clone(), decision.clone());
        decision
    }

    /// Cache-only lookup for call sites that cannot await.
    ///
    /// Returns the last computed value regardless of age, or the class default
    /// when nothing has been computed yet.
    pub fn cached_timeout(&self, provider: &ProviderId) -> Duration {
        self.read_cache()
            .get(provider)
            .map(TimeoutDecision::timeout)
            .unwrap_or_else(|| self.classes.bounds_of(provider).default_duration())
    }

    /// Recompute every provider with the configured parameters.
    pub async fn refresh_all(&self, providers: &[ProviderId]) -> usize {
        let params = self.defaults;
        for provider in providers {
            if params.adaptive_enabled {
                self.compute(provider, &params).await;
            }
        }
        debug!(providers = providers.len(), "Refreshed timeout cache");
        providers.len()
    }

    /// Cached decisions, sorted by provider.
    pub fn decisions(&self) -> Vec<TimeoutDecision> {
        let mut decisions: Vec<TimeoutDecision> = self.read_cache().values().cloned().collect();
        decisions.sort_by(|a, b| a.provider.cmp(&b.provider));
        decisions
    }

    /// Drop the cached decision for a provider.
    pub fn invalidate(&self, provider: &ProviderId) {
        self.write_cache().remove(provider);
    }

    /// Pre-warm the cache for `providers` periodically until `shutdown` fires.
    pub async fn run_refresh_loop(
        self: Arc<Self>,
        providers: Vec<ProviderId>,
        shutdown: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(self.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.refresh_all(&providers).await;
                }
            }
        }
        debug!("Timeout refresh loop stopped");
    }
}
