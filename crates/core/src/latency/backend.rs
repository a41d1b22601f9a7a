use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::provider::ProviderId;

use super::{LatencyError, LatencySample, PostgresLatencyBackend, SqliteLatencyBackend};

/// Persistent storage for latency samples.
#[async_trait]
pub trait LatencyBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Append a batch of samples.
    async fn insert_batch(&self, samples: &[LatencySample]) -> Result<(), LatencyError>;

    /// Durations of successful calls for `provider` recorded at or after
    /// `since`, sorted ascending.
    async fn success_durations(
        &self,
        provider: &ProviderId,
        since: DateTime<Utc>,
    ) -> Result<Vec<u64>, LatencyError>;

    /// Delete samples recorded before `cutoff`. Returns the number deleted.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, LatencyError>;
}

/// Open the backend selected by `database.backend`.
pub async fn create_latency_backend(
    config: &DatabaseConfig,
) -> Result<Arc<dyn LatencyBackend>, LatencyError> {
    match config.backend {
        DatabaseBackend::Sqlite => {
            let backend = SqliteLatencyBackend::new(&config.path)?;
            Ok(Arc::new(backend))
        }
        DatabaseBackend::Postgres => {
            let url = config.url.as_deref().ok_or_else(|| {
                LatencyError::Config("database.url is required for postgres".to_string())
            })?;
            let backend = PostgresLatencyBackend::connect(url, config.max_connections).await?;
            Ok(Arc::new(backend))
        }
    }
}
