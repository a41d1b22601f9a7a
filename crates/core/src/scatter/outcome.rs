use std::time::Duration;

use crate::latency::LatencyOutcome;
use crate::provider::{ErrorKind, ProviderError, ResultRecord};

/// Classified outcome of one provider task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Success(Vec<ResultRecord>),
    Failure {
        kind: ErrorKind,
        detail: String,
        /// Empty success reclassified as a timeout.
        silent: bool,
    },
}

impl TaskOutcome {
    /// Classify a provider result.
    ///
    /// Anything observed after the caller cancelled is `aborted`. An empty
    /// success taking at least `silent_ratio` of the budget is a timeout.
    pub fn classify(
        result: Result<Vec<ResultRecord>, ProviderError>,
        elapsed: Duration,
        budget: Duration,
        silent_ratio: f64,
        cancelled: bool,
    ) -> Self {
        if cancelled {
            return TaskOutcome::Failure {
                kind: ErrorKind::Aborted,
                detail: ProviderError::Cancelled.to_string(),
                silent: false,
            };
        }

        match result {
            Ok(records) if records.is_empty() && elapsed >= budget.mul_f64(silent_ratio) => {
                TaskOutcome::Failure {
                    kind: ErrorKind::Timeout,
                    detail: format!(
                        "empty result after {}ms of a {}ms budget",
                        elapsed.as_millis(),
                        budget.as_millis()
                    ),
                    silent: true,
                }
            }
            Ok(records) => TaskOutcome::Success(records),
            Err(e) => TaskOutcome::Failure {
                kind: e.kind(),
                detail: e.to_string(),
                silent: false,
            },
        }
    }

    /// Label used in summaries and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Success(_) => "success",
            TaskOutcome::Failure { kind, .. } => kind.as_str(),
        }
    }

    /// Latency classification, or `None` for outcomes that are not recorded.
    pub fn latency_outcome(&self) -> Option<LatencyOutcome> {
        match self {
            TaskOutcome::Success(_) => Some(LatencyOutcome::Success),
            TaskOutcome::Failure {
                kind: ErrorKind::Aborted,
                ..
            } => None,
            TaskOutcome::Failure {
                kind: ErrorKind::Timeout,
                ..
            } => Some(LatencyOutcome::Timeout),
            TaskOutcome::Failure { .. } => Some(LatencyOutcome::Error),
        }
    }
}
