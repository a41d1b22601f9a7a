use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::LatencyConfig;
use crate::metrics::{LATENCY_FLUSHES, LATENCY_SAMPLES_DROPPED, LATENCY_SAMPLES_PRUNED};
use crate::provider::ProviderId;

use super::percentile::nearest_rank;
use super::{LatencyBackend, LatencySample};

/// Buffered front-end over a [`LatencyBackend`].
///
/// `record` only appends to an in-memory queue; the flush loop writes the queue
/// to the backend in batches. Nothing here returns an error to callers: backend
/// failures are logged and the affected batch is dropped.
pub struct LatencyStore {
    backend: Arc<dyn LatencyBackend>,
    queue: Mutex<Vec<LatencySample>>,
    flush_requested: Notify,
    config: LatencyConfig,
}

impl LatencyStore {
    pub fn new(backend: Arc<dyn LatencyBackend>, config: LatencyConfig) -> Self {
        Self {
            backend,
            queue: Mutex::new(Vec::new()),
            flush_requested: Notify::new(),
            config,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn queue(&self) -> MutexGuard<'_, Vec<LatencySample>> {
        // A panic while holding the lock cannot leave the Vec inconsistent.
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a sample. Wakes the flush loop once the queue reaches the threshold.
    pub fn record(&self, sample: LatencySample) {
        let len = {
            let mut queue = self.queue();
            queue.push(sample);
            queue.len()
        };
        if len >= self.config.flush_threshold {
            self.flush_requested.notify_one();
        }
    }

    /// Number of samples waiting to be flushed.
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Write every queued sample to the backend. Returns the number written.
    ///
    /// On failure the batch is dropped, not re-queued.
    pub async fn flush(&self) -> usize {
        let batch = std::mem::take(&mut *self.queue());
        if batch.is_empty() {
            return 0;
        }

        match self.backend.insert_batch(&batch).await {
            Ok(()) => {
                LATENCY_FLUSHES.with_label_values(&["ok"]).inc();
                debug!(samples = batch.len(), backend = self.backend.name(), "Flushed latency samples");
                batch.len()
            }
            Err(e) => {
                LATENCY_FLUSHES.with_label_values(&["error"]).inc();
                LATENCY_SAMPLES_DROPPED.inc_by(batch.len() as u64);
                warn!(
                    samples = batch.len(),
                    backend = self.backend.name(),
                    error = %e,
                    "Failed to flush latency samples, dropping batch"
                );
                0
            }
        }
    }

    /// Nearest-rank percentile of successful call durations for `provider`
    /// within the trailing `window`.
    ///
    /// Returns `None` with fewer than `min_samples` successes, and also when the
    /// backend cannot be read (callers fall back to static defaults).
    pub async fn percentile(
        &self,
        provider: &ProviderId,
        percentile: f64,
        window: Duration,
        min_samples: usize,
    ) -> Option<u64> {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let since = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let durations = match self.backend.success_durations(provider, since).await {
            Ok(durations) => durations,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Failed to read latency samples");
                return None;
            }
        };

        if durations.len() < min_samples.max(1) {
            return None;
        }
        nearest_rank(&durations, percentile)
    }

    /// Delete samples older than the retention horizon. Returns the number deleted.
    pub async fn prune(&self) -> u64 {
        let Some(cutoff) = retention_cutoff(Utc::now(), self.config.retention_ms) else {
            debug!(
                retention_ms = self.config.retention_ms,
                "Retention horizon out of range, nothing to prune"
            );
            return 0;
        };
        match self.backend.prune_before(cutoff).await {
            Ok(deleted) => {
                LATENCY_SAMPLES_PRUNED.inc_by(deleted);
                if deleted > 0 {
                    info!(deleted, "Pruned expired latency samples");
                }
                deleted
            }
            Err(e) => {
                warn!(error = %e, "Failed to prune latency samples");
                0
            }
        }
    }

    /// Flush on a fixed interval or when the queue fills up, until `shutdown`
    /// fires. Performs a final flush before returning.
    pub async fn run_flush_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.flush_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            interval_ms = self.config.flush_interval_ms,
            threshold = self.config.flush_threshold,
            "Latency flush loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
                _ = self.flush_requested.notified() => {}
            }
            self.flush().await;
        }

        let flushed = self.flush().await;
        debug!(flushed, "Latency flush loop stopped");
    }

    /// Prune expired samples periodically until `shutdown` fires.
    pub async fn run_prune_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.prune_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.prune().await;
                }
            }
        }
        debug!("Latency prune loop stopped");
    }
}

/// `now - retention_ms`, or `None` when that instant is not representable.
fn retention_cutoff(now: DateTime<Utc>, retention_ms: u64) -> Option<DateTime<Utc>> {
    let retention = chrono::Duration::try_milliseconds(i64::try_from(retention_ms).ok()?)?;
    now.checked_sub_signed(retention)
}
