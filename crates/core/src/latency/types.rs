use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::ProviderId;

/// Outcome of a provider call, as far as latency accounting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyOutcome {
    Success,
    Timeout,
    Error,
}

impl LatencyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LatencyOutcome::Success => "success",
            LatencyOutcome::Timeout => "timeout",
            LatencyOutcome::Error => "error",
        }
    }
}

/// One timed provider call. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    pub provider: ProviderId,
    pub duration_ms: u64,
    pub outcome: LatencyOutcome,
    pub result_count: u32,
    pub recorded_at: DateTime<Utc>,
}

impl LatencySample {
    /// Sample stamped with the current time.
    pub fn new(
        provider: ProviderId,
        duration_ms: u64,
        outcome: LatencyOutcome,
        result_count: u32,
    ) -> Self {
        Self {
            provider,
            duration_ms,
            outcome,
            result_count,
            recorded_at: Utc::now(),
        }
    }

    pub fn recorded_at_millis(&self) -> i64 {
        self.recorded_at.timestamp_millis()
    }
}

/// Errors from latency backends.
#[derive(Debug, Error)]
pub enum LatencyError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid backend configuration: {0}")]
    Config(String),
}
