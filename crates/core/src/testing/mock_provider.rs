//! Mock provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::ResolvedSearchConfig;
use crate::provider::{LogContext, Provider, ProviderError, ProviderQuery, ResultRecord};

/// A recorded provider call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub query: ProviderQuery,
    pub request_id: String,
    pub timestamp: Instant,
}

/// Mock implementation of the [`Provider`] trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable results (stamped with the provider name)
/// - Simulate latency, honoring the query timeout like a real client
/// - Fail with a configured error
/// - Hang until cancelled, ignoring its timeout
///
/// # Example
///
/// ```rust,ignore
/// use fanout_core::testing::{fixtures, MockProvider};
///
/// let provider = MockProvider::new("YTS")
///     .with_results(vec![fixtures::result_record("Ubuntu 24.04")])
///     .with_delay(Duration::from_millis(50));
///
/// // ... run a search ...
///
/// assert_eq!(provider.call_count().await, 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    results: Arc<RwLock<Vec<ResultRecord>>>,
    delay: Arc<RwLock<Duration>>,
    error: Arc<RwLock<Option<ProviderError>>>,
    hang: Arc<RwLock<bool>>,
    calls: Arc<RwLock<Vec<RecordedCall>>>,
}

impl MockProvider {
    /// Create a mock that returns no results immediately.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            results: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            error: Arc::new(RwLock::new(None)),
            hang: Arc::new(RwLock::new(false)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    // Builders run before the mock is shared, so the locks are uncontended.
    pub fn with_results(self, results: Vec<ResultRecord>) -> Self {
        *self.results.try_write().unwrap() = results;
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.try_write().unwrap() = delay;
        self
    }

    pub fn with_error(self, error: ProviderError) -> Self {
        *self.error.try_write().unwrap() = Some(error);
        self
    }

    /// Never return on its own; only cancellation ends the call.
    pub fn hanging(self) -> Self {
        *self.hang.try_write().unwrap() = true;
        self
    }

    pub async fn set_results(&self, results: Vec<ResultRecord>) {
        *self.results.write().await = results;
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Fail every subsequent call with `error`, or stop failing with `None`.
    pub async fn set_error(&self, error: Option<ProviderError>) {
        *self.error.write().await = error;
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &ProviderQuery,
        cancel: &CancellationToken,
        ctx: &LogContext,
        _config: &ResolvedSearchConfig,
    ) -> Result<Vec<ResultRecord>, ProviderError> {
        self.calls.write().await.push(RecordedCall {
            query: query.clone(),
            request_id: ctx.request_id.clone(),
            timestamp: Instant::now(),
        });

        if *self.hang.read().await {
            cancel.cancelled().await;
            return Err(ProviderError::Cancelled);
        }

        let delay = *self.delay.read().await;
        if delay > query.timeout {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(query.timeout) => return Err(ProviderError::Timeout),
            }
        }
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if let Some(error) = self.error.read().await.clone() {
            return Err(error);
        }

        let languages: Vec<String> = query.language.iter().cloned().collect();
        Ok(self
            .results
            .read()
            .await
            .iter()
            .cloned()
            .map(|mut record| {
                record.source = self.name.clone();
                if !languages.is_empty() {
                    record.languages = languages.clone();
                }
                record
            })
            .collect())
    }
}
