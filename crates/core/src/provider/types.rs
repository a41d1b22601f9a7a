//! Types for the provider contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::ResolvedSearchConfig;

use super::ProviderId;

/// A normalized result returned by a provider call.
///
/// The orchestrator never looks inside a record; only the number of records a
/// call returned is used as a health signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub title: String,
    /// Content hash (lowercase hex info hash for torrents).
    pub info_hash: String,
    pub size_bytes: u64,
    pub seeders: u32,
    pub peers: u32,
    /// Label of the provider that produced this record.
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
}

/// One partition of a search request, as handed to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderQuery {
    /// Free-text search query.
    pub query: String,
    /// Language partition; `None` is the global partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Budget the provider should enforce on its own requests.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
}

/// Correlation data for log lines emitted by a provider call.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub request_id: String,
    pub task: String,
    pub provider: ProviderId,
}

/// Classification of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller-initiated cancellation. Never counted against the provider.
    Aborted,
    Timeout,
    RateLimit,
    ServerError,
    Captcha,
    Generic,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Aborted => "aborted",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Captcha => "captcha",
            ErrorKind::Generic => "error",
        }
    }

    /// Whether this kind should trip the penalty faster than a generic error.
    pub fn is_fast_penalty(&self) -> bool {
        matches!(self, ErrorKind::RateLimit | ErrorKind::ServerError)
    }
}

/// Errors a provider call can produce.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Request cancelled")]
    Cancelled,

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Blocked by challenge: {0}")]
    Captcha(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Classify this error for penalty and latency accounting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Cancelled => ErrorKind::Aborted,
            ProviderError::Timeout => ErrorKind::Timeout,
            ProviderError::Http { status: 429, .. } => ErrorKind::RateLimit,
            ProviderError::Http { status: 408, .. } => ErrorKind::Timeout,
            ProviderError::Http { status, .. } if (500..600).contains(status) => {
                ErrorKind::ServerError
            }
            ProviderError::Captcha(_) => ErrorKind::Captcha,
            _ => ErrorKind::Generic,
        }
    }
}

/// An upstream data source queried by the scatter-gather orchestrator.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Normalized identity derived from [`Provider::name`].
    fn id(&self) -> ProviderId {
        ProviderId::normalize(self.name())
    }

    /// Run one search partition.
    ///
    /// Implementations should enforce `query.timeout` on their own requests,
    /// stop promptly when `cancel` fires, and return a classified error instead
    /// of partial data on failure.
    async fn search(
        &self,
        query: &ProviderQuery,
        cancel: &CancellationToken,
        ctx: &LogContext,
        config: &ResolvedSearchConfig,
    ) -> Result<Vec<ResultRecord>, ProviderError>;
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
