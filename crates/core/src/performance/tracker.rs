use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PerformanceConfig;
use crate::metrics::PENALTIES_APPLIED;
use crate::provider::{ErrorKind, ProviderId};

use super::types::{
    score, LastError, OutcomeSample, PerformanceRecord, ProviderHealth, ScoreWeights,
    SelectionOptions,
};

type Record = Arc<Mutex<PerformanceRecord>>;

fn lock(record: &Record) -> MutexGuard<'_, PerformanceRecord> {
    record.lock().unwrap_or_else(|e| e.into_inner())
}

/// Per-provider circuit breaker with score-based ranking.
///
/// Writers for different providers never contend: the map lock is only taken
/// for writing when a provider is seen for the first time.
pub struct PerformanceTracker {
    config: PerformanceConfig,
    records: RwLock<HashMap<ProviderId, Record>>,
}

impl PerformanceTracker {
    pub fn new(config: PerformanceConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    fn weights(&self) -> ScoreWeights {
        ScoreWeights {
            recency_decay: self.config.recency_decay,
            latency_weight: self.config.latency_weight,
        }
    }

    fn get(&self, provider: &ProviderId) -> Option<Record> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(provider)
            .cloned()
    }

    fn get_or_insert(&self, provider: &ProviderId) -> Record {
        if let Some(record) = self.get(provider) {
            return record;
        }
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(records.entry(provider.clone()).or_default())
    }

    /// Penalty duration after `failures` consecutive failures against `threshold`.
    fn backoff(&self, failures: u32, threshold: u32) -> Duration {
        let exponent = failures.saturating_sub(threshold).min(63);
        let factor = 1u64 << exponent;
        let ms = self
            .config
            .base_penalty_ms
            .saturating_mul(factor)
            .min(self.config.max_penalty_ms);
        Duration::from_millis(ms)
    }

    /// Record a successful call.
    ///
    /// A success with results clears the failure streak and lifts any penalty;
    /// an empty success only shortens the streak.
    pub fn record_success(&self, provider: &ProviderId, result_count: u32, duration_ms: u64) {
        let record = self.get_or_insert(provider);
        let mut record = lock(&record);

        record.push(
            OutcomeSample {
                success: true,
                result_count,
                duration_ms,
            },
            self.config.window_size,
        );
        record.total_successes += 1;

        if result_count > 0 {
            if record.penalty_until.take().is_some() {
                info!(provider = %provider, "Provider recovered, penalty lifted");
            }
            record.consecutive_failures = 0;
        } else {
            record.consecutive_failures = record.consecutive_failures.saturating_sub(1);
        }
    }

    /// Record a failed call. Aborted calls are ignored.
    pub fn record_failure(
        &self,
        provider: &ProviderId,
        kind: ErrorKind,
        duration_ms: u64,
        detail: &str,
    ) {
        if kind == ErrorKind::Aborted {
            return;
        }

        let record = self.get_or_insert(provider);
        let mut record = lock(&record);

        record.push(
            OutcomeSample {
                success: false,
                result_count: 0,
                duration_ms,
            },
            self.config.window_size,
        );
        record.total_failures += 1;
        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        record.last_error = Some(LastError {
            kind,
            detail: detail.to_string(),
            at: Utc::now(),
        });

        let threshold = if kind.is_fast_penalty() {
            self.config.fast_failure_threshold
        } else {
            self.config.failure_threshold
        };

        if record.consecutive_failures >= threshold {
            let backoff = self.backoff(record.consecutive_failures, threshold);
            let until = Instant::now() + backoff;
            record.penalty_until = Some(record.penalty_until.map_or(until, |u| u.max(until)));

            PENALTIES_APPLIED
                .with_label_values(&[provider.as_str(), kind.as_str()])
                .inc();
            warn!(
                provider = %provider,
                kind = kind.as_str(),
                consecutive_failures = record.consecutive_failures,
                penalty_ms = backoff.as_millis() as u64,
                "Provider penalized"
            );
        } else {
            debug!(
                provider = %provider,
                kind = kind.as_str(),
                consecutive_failures = record.consecutive_failures,
                "Provider failure recorded"
            );
        }
    }

    /// Whether the provider is inside a penalty window.
    pub fn is_penalized(&self, provider: &ProviderId) -> bool {
        let now = Instant::now();
        self.get(provider)
            .map(|r| lock(&r).is_penalized(now))
            .unwrap_or(false)
    }

    /// Split `candidates` into (unpenalized, penalized), preserving order.
    pub fn partition(&self, candidates: &[ProviderId]) -> (Vec<ProviderId>, Vec<ProviderId>) {
        candidates
            .iter()
            .cloned()
            .partition(|provider| !self.is_penalized(provider))
    }

    /// Whether any provider has recorded an outcome.
    pub fn has_data(&self) -> bool {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .any(|r| lock(r).has_data())
    }

    /// Current score of a provider (neutral when unknown).
    pub fn score(&self, provider: &ProviderId, slow_threshold_ms: Option<u64>) -> f64 {
        match self.get(provider) {
            Some(record) => {
                let mut record = lock(&record);
                let value = score(&record.recent, self.weights(), slow_threshold_ms);
                record.last_score = Some(value);
                value
            }
            None => super::NEUTRAL_SCORE,
        }
    }

    /// Rank unpenalized candidates by score and pick the default subset.
    ///
    /// Keeps candidates scoring at least `min_score`, best first, at most
    /// `top_n` of them. Never returns an empty list while an unpenalized
    /// candidate exists: the best one is kept even if nothing clears the bar.
    pub fn select_providers(
        &self,
        candidates: &[ProviderId],
        options: &SelectionOptions,
    ) -> Vec<ProviderId> {
        let (unpenalized, _) = self.partition(candidates);
        if unpenalized.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(ProviderId, f64)> = unpenalized
            .into_iter()
            .map(|provider| {
                let value = self.score(&provider, options.slow_threshold_ms);
                (provider, value)
            })
            .collect();
        // Stable sort: ties keep candidate order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let min_score = options.min_score.map(f64::from).unwrap_or(0.0);
        let best = scored[0].0.clone();
        let mut selected: Vec<ProviderId> = scored
            .into_iter()
            .filter(|(_, value)| *value >= min_score)
            .map(|(provider, _)| provider)
            .collect();

        if selected.is_empty() {
            selected.push(best);
        }
        if let Some(top_n) = options.top_n {
            selected.truncate(top_n.max(1));
        }
        selected
    }

    /// Health of each listed provider, in the given order.
    pub fn snapshot(&self, providers: &[ProviderId]) -> Vec<ProviderHealth> {
        let now = Instant::now();
        let slow = self.config.slow_threshold_ms;

        providers
            .iter()
            .map(|provider| {
                let score = self.score(provider, slow);
                match self.get(provider) {
                    Some(record) => {
                        let record = lock(&record);
                        ProviderHealth {
                            provider: provider.clone(),
                            score,
                            penalized: record.is_penalized(now),
                            penalty_remaining_ms: record
                                .penalty_until
                                .filter(|until| *until > now)
                                .map(|until| (until - now).as_millis() as u64),
                            consecutive_failures: record.consecutive_failures,
                            total_successes: record.total_successes,
                            total_failures: record.total_failures,
                            window_samples: record.recent.len(),
                            mean_success_ms: record.mean_success_ms(),
                            last_error: record.last_error.clone(),
                        }
                    }
                    None => ProviderHealth {
                        provider: provider.clone(),
                        score,
                        penalized: false,
                        penalty_remaining_ms: None,
                        consecutive_failures: 0,
                        total_successes: 0,
                        total_failures: 0,
                        window_samples: 0,
                        mean_success_ms: None,
                        last_error: None,
                    },
                }
            })
            .collect()
    }

    /// Forget everything about a provider. Returns whether it had a record.
    pub fn reset(&self, provider: &ProviderId) -> bool {
        let removed = self
            .records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(provider)
            .is_some();
        if removed {
            info!(provider = %provider, "Provider performance record reset");
        }
        removed
    }
}
