use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::metrics::BACKGROUND_JOBS;

use super::{ScatterResult, SearchRequest};

/// Work to run after a search has returned, such as cache warming.
#[async_trait]
pub trait PostSearchHook: Send + Sync {
    fn name(&self) -> &str;

    async fn after_search(
        &self,
        request: &SearchRequest,
        result: &ScatterResult,
        cancel: CancellationToken,
    ) -> anyhow::Result<()>;
}

/// Names kept by [`BackgroundScheduler::scheduled_jobs`].
pub const SCHEDULED_HISTORY: usize = 64;

/// Runs detached jobs, each in its own cancellation scope under `shutdown`.
///
/// The most recent job names are recorded when scheduled so callers can check
/// what was scheduled without racing the job itself.
#[derive(Clone)]
pub struct BackgroundScheduler {
    tasks: TaskTracker,
    shutdown: CancellationToken,
    scheduled: Arc<Mutex<VecDeque<String>>>,
}

impl BackgroundScheduler {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            tasks: TaskTracker::new(),
            shutdown,
            scheduled: Arc::new(Mutex::new(VecDeque::with_capacity(SCHEDULED_HISTORY))),
        }
    }

    /// Spawn `job` with a child cancellation token. Errors are logged.
    pub fn schedule<F, Fut>(&self, name: &str, job: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.to_string();
        {
            let mut scheduled = self.scheduled.lock().unwrap_or_else(|e| e.into_inner());
            if scheduled.len() == SCHEDULED_HISTORY {
                scheduled.pop_front();
            }
            scheduled.push_back(name.clone());
        }

        let token = self.shutdown.child_token();
        let job = job(token.clone());

        self.tasks.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    BACKGROUND_JOBS.with_label_values(&[name.as_str(), "cancelled"]).inc();
                    debug!(job = %name, "Background job cancelled");
                }
                result = job => match result {
                    Ok(()) => {
                        BACKGROUND_JOBS.with_label_values(&[name.as_str(), "ok"]).inc();
                        debug!(job = %name, "Background job finished");
                    }
                    Err(e) => {
                        BACKGROUND_JOBS.with_label_values(&[name.as_str(), "error"]).inc();
                        warn!(job = %name, error = %format!("{:#}", e), "Background job failed");
                    }
                },
            }
        });
    }

    /// Names of the last [`SCHEDULED_HISTORY`] jobs scheduled, oldest first.
    pub fn scheduled_jobs(&self) -> Vec<String> {
        self.scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Number of jobs still running.
    pub fn active(&self) -> usize {
        self.tasks.len()
    }

    /// Stop accepting jobs and wait for the running ones.
    ///
    /// Jobs only stop early if the shutdown token has been cancelled.
    pub async fn wait(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}
