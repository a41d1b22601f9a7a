//! Scatter-gather orchestrator.
//!
//! Chooses providers for a request, runs one task per provider and language
//! partition concurrently, records every outcome, and merges the results of
//! the tasks that succeeded.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, ResolvedSearchConfig};
use crate::latency::{LatencySample, LatencyStore};
use crate::metrics::{
    COALESCED_REQUESTS, PROVIDER_CALLS, PROVIDER_CALL_DURATION, PROVIDER_RESULTS, SEARCHES,
    SEARCH_DURATION,
};
use crate::performance::{PerformanceTracker, SelectionOptions};
use crate::provider::{
    LogContext, Provider, ProviderError, ProviderId, ProviderQuery, ProviderRegistry,
    ResultRecord,
};
use crate::timeout::{AdaptiveTimeoutEngine, TimeoutParams};

use super::background::{BackgroundScheduler, PostSearchHook};
use super::coalesce::InFlight;
use super::outcome::TaskOutcome;
use super::types::{AdmissionMode, ScatterResult, SearchRequest, SearchStatus, TaskSummary};

/// Providers chosen for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPlan {
    pub providers: Vec<ProviderId>,
    pub admission: AdmissionMode,
    pub skipped_penalized: Vec<ProviderId>,
}

/// The top-level search coordinator.
pub struct ScatterGather {
    config: Arc<Config>,
    registry: Arc<ProviderRegistry>,
    tracker: Arc<PerformanceTracker>,
    timeouts: Arc<AdaptiveTimeoutEngine>,
    latency: Arc<LatencyStore>,
    background: BackgroundScheduler,
    hook: Option<Arc<dyn PostSearchHook>>,
    inflight: Arc<InFlight<ScatterResult>>,
    shutdown: CancellationToken,
}

impl ScatterGather {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<ProviderRegistry>,
        tracker: Arc<PerformanceTracker>,
        timeouts: Arc<AdaptiveTimeoutEngine>,
        latency: Arc<LatencyStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            registry,
            tracker,
            timeouts,
            latency,
            background: BackgroundScheduler::new(shutdown.clone()),
            hook: None,
            inflight: Arc::new(InFlight::new()),
            shutdown,
        }
    }

    /// Run `hook` in the background after every search.
    pub fn with_post_search_hook(mut self, hook: Arc<dyn PostSearchHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn background(&self) -> &BackgroundScheduler {
        &self.background
    }

    /// Searches currently running on behalf of coalesced callers.
    pub fn inflight_searches(&self) -> usize {
        self.inflight.len()
    }

    /// Choose the providers to query.
    pub async fn plan(&self, request: &SearchRequest, resolved: &ResolvedSearchConfig) -> ScatterPlan {
        let enabled = self.registry.enabled_ids().await;
        let perf = resolved.perf_tracking_enabled;

        if let Some(wanted) = request.explicit_providers() {
            let candidates: Vec<ProviderId> = enabled
                .into_iter()
                .filter(|id| wanted.contains(id))
                .collect();
            return self.filter_penalized(candidates, AdmissionMode::Explicit, perf);
        }

        if !perf || !self.tracker.has_data() {
            let (candidates, admission) = self.default_subset(enabled);
            return self.filter_penalized(candidates, admission, perf);
        }

        let (unpenalized, penalized) = self.tracker.partition(&enabled);
        if unpenalized.is_empty() {
            return ScatterPlan {
                providers: enabled,
                admission: AdmissionMode::PenaltyFallback,
                skipped_penalized: Vec::new(),
            };
        }

        ScatterPlan {
            providers: self
                .tracker
                .select_providers(&unpenalized, &SelectionOptions::from(resolved)),
            admission: AdmissionMode::Ranked,
            skipped_penalized: penalized,
        }
    }

    fn default_subset(&self, enabled: Vec<ProviderId>) -> (Vec<ProviderId>, AdmissionMode) {
        let defaults: Vec<ProviderId> = self
            .config
            .scatter
            .default_providers
            .iter()
            .map(|name| ProviderId::normalize(name))
            .collect();

        let subset: Vec<ProviderId> = enabled
            .iter()
            .filter(|id| defaults.contains(id))
            .cloned()
            .collect();

        if subset.is_empty() {
            (enabled, AdmissionMode::AllEnabled)
        } else {
            (subset, AdmissionMode::DefaultSubset)
        }
    }

    fn filter_penalized(
        &self,
        candidates: Vec<ProviderId>,
        admission: AdmissionMode,
        perf: bool,
    ) -> ScatterPlan {
        if !perf || candidates.is_empty() {
            return ScatterPlan {
                providers: candidates,
                admission,
                skipped_penalized: Vec::new(),
            };
        }

        let (unpenalized, penalized) = self.tracker.partition(&candidates);
        if unpenalized.is_empty() {
            ScatterPlan {
                providers: candidates,
                admission: AdmissionMode::PenaltyFallback,
                skipped_penalized: Vec::new(),
            }
        } else {
            ScatterPlan {
                providers: unpenalized,
                admission,
                skipped_penalized: penalized,
            }
        }
    }

    /// Run a search. Never fails: task errors are recorded and logged, and the
    /// caller gets whatever succeeded.
    pub async fn search(&self, request: &SearchRequest, cancel: &CancellationToken) -> ScatterResult {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let resolved =
            ResolvedSearchConfig::resolve(&self.config, request.user.as_ref(), &request.overrides);

        let plan = self.plan(request, &resolved).await;

        if plan.providers.is_empty() {
            warn!(
                request_id = %request_id,
                admission = plan.admission.as_str(),
                "No usable providers for search"
            );
            return self.finish(
                request,
                ScatterResult {
                    request_id,
                    results: Vec::new(),
                    tasks: Vec::new(),
                    status: SearchStatus::NoProviders,
                    admission: Some(plan.admission),
                    skipped_penalized: plan.skipped_penalized,
                    duration_ms: started.elapsed().as_millis() as u64,
                },
            );
        }

        if !plan.skipped_penalized.is_empty() {
            debug!(
                request_id = %request_id,
                skipped = ?plan.skipped_penalized,
                "Skipping penalized providers"
            );
        }
        if plan.admission == AdmissionMode::PenaltyFallback {
            warn!(
                request_id = %request_id,
                providers = plan.providers.len(),
                "Every candidate is penalized, querying all of them"
            );
        }

        let params = resolved.timeout_params(&self.config);
        let partitions = request.language_partitions();

        let mut tasks = FuturesUnordered::new();
        for id in &plan.providers {
            let Some(provider) = self.registry.get(id) else {
                continue;
            };
            for language in &partitions {
                tasks.push(self.run_task(
                    &request_id,
                    Arc::clone(&provider),
                    id.clone(),
                    &request.query,
                    language.clone(),
                    &params,
                    &resolved,
                    cancel,
                ));
            }
        }

        info!(
            request_id = %request_id,
            query = %request.query,
            providers = plan.providers.len(),
            tasks = tasks.len(),
            admission = plan.admission.as_str(),
            "Starting scatter-gather search"
        );

        let mut results = Vec::new();
        let mut summaries = Vec::new();
        while let Some((summary, records)) = tasks.next().await {
            results.extend(records);
            summaries.push(summary);
        }
        drop(tasks);

        let succeeded = summaries.iter().filter(|s| s.is_success()).count();
        let status = if cancel.is_cancelled() {
            SearchStatus::Cancelled
        } else if succeeded == summaries.len() {
            SearchStatus::Completed
        } else if succeeded > 0 {
            SearchStatus::Partial
        } else {
            SearchStatus::AllFailed
        };

        self.finish(
            request,
            ScatterResult {
                request_id,
                results,
                tasks: summaries,
                status,
                admission: Some(plan.admission),
                skipped_penalized: plan.skipped_penalized,
                duration_ms: started.elapsed().as_millis() as u64,
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_task(
        &self,
        request_id: &str,
        provider: Arc<dyn Provider>,
        id: ProviderId,
        query: &str,
        language: Option<String>,
        params: &TimeoutParams,
        resolved: &ResolvedSearchConfig,
        cancel: &CancellationToken,
    ) -> (TaskSummary, Vec<ResultRecord>) {
        let task = match &language {
            Some(language) => format!("{}:{}", id, language),
            None => id.to_string(),
        };

        let budget = self.timeouts.get_timeout(&id, params).await;
        let hard_deadline = budget.mul_f64(self.config.scatter.hard_deadline_factor);
        let query = ProviderQuery {
            query: query.to_string(),
            language: language.clone(),
            timeout: budget,
        };
        let ctx = LogContext {
            request_id: request_id.to_string(),
            task: task.clone(),
            provider: id.clone(),
        };
        let token = cancel.child_token();

        let started = Instant::now();
        let call = AssertUnwindSafe(provider.search(&query, &token, &ctx, resolved)).catch_unwind();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(ProviderError::Cancelled),
            result = tokio::time::timeout(hard_deadline, call) => match result {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => {
                    let message = panic_message(panic.as_ref());
                    error!(
                        request_id = %request_id,
                        task = %task,
                        panic = %message,
                        "Provider panicked"
                    );
                    Err(ProviderError::Other(format!("provider panicked: {}", message)))
                }
                Err(_) => {
                    warn!(
                        request_id = %request_id,
                        task = %task,
                        deadline_ms = hard_deadline.as_millis() as u64,
                        "Provider ignored its timeout, cutting it off"
                    );
                    Err(ProviderError::Timeout)
                }
            },
        };
        let elapsed = started.elapsed();
        token.cancel();

        let outcome = TaskOutcome::classify(
            result,
            elapsed,
            budget,
            self.config.scatter.silent_timeout_ratio,
            cancel.is_cancelled(),
        );
        self.account(&id, &outcome, elapsed, resolved.perf_tracking_enabled);

        let mut summary = TaskSummary {
            task,
            provider: id,
            language,
            outcome: outcome.label().to_string(),
            result_count: 0,
            duration_ms: elapsed.as_millis() as u64,
            timeout_ms: budget.as_millis() as u64,
            silent_timeout: false,
            error: None,
        };

        match outcome {
            TaskOutcome::Success(records) => {
                debug!(
                    request_id = %request_id,
                    task = %summary.task,
                    results = records.len(),
                    duration_ms = summary.duration_ms,
                    "Task succeeded"
                );
                summary.result_count = records.len();
                (summary, records)
            }
            TaskOutcome::Failure {
                kind,
                detail,
                silent,
            } => {
                if kind == crate::provider::ErrorKind::Aborted {
                    debug!(request_id = %request_id, task = %summary.task, "Task aborted");
                } else {
                    warn!(
                        request_id = %request_id,
                        task = %summary.task,
                        kind = kind.as_str(),
                        duration_ms = summary.duration_ms,
                        error = %detail,
                        "Task failed"
                    );
                }
                summary.silent_timeout = silent;
                summary.error = Some(detail);
                (summary, Vec::new())
            }
        }
    }

    /// Forward a task outcome to the tracker, the latency store and metrics.
    fn account(&self, id: &ProviderId, outcome: &TaskOutcome, elapsed: Duration, perf: bool) {
        let duration_ms = elapsed.as_millis() as u64;

        PROVIDER_CALLS
            .with_label_values(&[id.as_str(), outcome.label()])
            .inc();

        let Some(latency_outcome) = outcome.latency_outcome() else {
            return;
        };

        PROVIDER_CALL_DURATION
            .with_label_values(&[id.as_str()])
            .observe(elapsed.as_secs_f64());

        let result_count = match outcome {
            TaskOutcome::Success(records) => records.len() as u32,
            TaskOutcome::Failure { .. } => 0,
        };

        if perf {
            match outcome {
                TaskOutcome::Success(records) => {
                    self.tracker
                        .record_success(id, records.len() as u32, duration_ms);
                }
                TaskOutcome::Failure { kind, detail, .. } => {
                    self.tracker.record_failure(id, *kind, duration_ms, detail);
                }
            }
        }

        if let TaskOutcome::Success(_) = outcome {
            PROVIDER_RESULTS
                .with_label_values(&[id.as_str()])
                .observe(result_count as f64);
        }

        self.latency.record(LatencySample::new(
            id.clone(),
            duration_ms,
            latency_outcome,
            result_count,
        ));
    }

    /// Log, record metrics and schedule the post-search hook.
    fn finish(&self, request: &SearchRequest, result: ScatterResult) -> ScatterResult {
        SEARCHES.with_label_values(&[result.status.as_str()]).inc();
        SEARCH_DURATION
            .with_label_values(&[result.status.as_str()])
            .observe(result.duration_ms as f64 / 1000.0);

        info!(
            request_id = %result.request_id,
            status = result.status.as_str(),
            results = result.results.len(),
            tasks = result.tasks.len(),
            duration_ms = result.duration_ms,
            "Search finished"
        );

        if let Some(hook) = &self.hook {
            if result.status != SearchStatus::Cancelled {
                let hook = Arc::clone(hook);
                let request = request.clone();
                let snapshot = result.clone();
                let name = format!("post_search:{}", hook.name());
                self.background.schedule(&name, move |cancel| async move {
                    hook.after_search(&request, &snapshot, cancel).await
                });
            }
        }

        result
    }

    /// Run `request`, sharing one execution among identical concurrent requests.
    ///
    /// The shared execution runs under the runtime's shutdown token, not the
    /// caller's: a caller cancelling `cancel` stops waiting and gets an empty
    /// `cancelled` result while the others keep waiting.
    pub async fn search_coalesced(
        self: &Arc<Self>,
        request: SearchRequest,
        cancel: CancellationToken,
    ) -> ScatterResult {
        let key = request.coalescing_key();

        let this = Arc::clone(self);
        let (shared, leader) = self.inflight.join_or_start(&key, || {
            let key = key.clone();
            let handle = tokio::spawn(async move {
                let _entry = this.inflight.entry(&key);
                let scope = this.shutdown.child_token();
                this.search(&request, &scope).await
            });
            async move {
                handle.await.unwrap_or_else(|e| {
                    error!(error = %e, "Coalesced search task failed");
                    ScatterResult::empty(SearchStatus::AllFailed)
                })
            }
            .boxed()
        });

        if !leader {
            COALESCED_REQUESTS.inc();
            debug!(key = %key, "Joined in-flight search");
        }

        tokio::select! {
            _ = cancel.cancelled() => ScatterResult::empty(SearchStatus::Cancelled),
            result = shared => result,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
