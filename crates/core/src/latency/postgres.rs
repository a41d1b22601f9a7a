use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::provider::ProviderId;

use super::{LatencyBackend, LatencyError, LatencySample};

/// Rows per INSERT statement; keeps bind parameters well under the protocol limit.
const INSERT_CHUNK: usize = 1_000;

/// PostgreSQL-backed latency store, for instances sharing latency history.
pub struct PostgresLatencyBackend {
    pool: PgPool,
}

impl PostgresLatencyBackend {
    /// Connect and create the schema if needed.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, LatencyError> {
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| LatencyError::Config(e.to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let backend = Self { pool };
        backend.migrate().await?;
        Ok(backend)
    }

    async fn migrate(&self) -> Result<(), LatencyError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS latency_samples (
                id BIGSERIAL PRIMARY KEY,
                provider TEXT NOT NULL,
                duration_ms BIGINT NOT NULL,
                outcome TEXT NOT NULL,
                result_count INTEGER NOT NULL,
                recorded_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_latency_samples_lookup ON latency_samples(provider, outcome, recorded_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_latency_samples_recorded_at ON latency_samples(recorded_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

#[async_trait]
impl LatencyBackend for PostgresLatencyBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn insert_batch(&self, samples: &[LatencySample]) -> Result<(), LatencyError> {
        for chunk in samples.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO latency_samples (provider, duration_ms, outcome, result_count, recorded_at) ",
            );
            builder.push_values(chunk, |mut row, sample| {
                row.push_bind(sample.provider.as_str().to_string())
                    .push_bind(sample.duration_ms as i64)
                    .push_bind(sample.outcome.as_str())
                    .push_bind(sample.result_count as i32)
                    .push_bind(sample.recorded_at_millis());
            });
            builder
                .build()
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    async fn success_durations(
        &self,
        provider: &ProviderId,
        since: DateTime<Utc>,
    ) -> Result<Vec<u64>, LatencyError> {
        let rows: Vec<i64> = sqlx::query_scalar(
            "SELECT duration_ms FROM latency_samples WHERE provider = $1 AND outcome = 'success' AND recorded_at >= $2 ORDER BY duration_ms ASC",
        )
        .bind(provider.as_str())
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(|ms| ms.max(0) as u64).collect())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, LatencyError> {
        let result = sqlx::query("DELETE FROM latency_samples WHERE recorded_at < $1")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}

fn db_err(e: sqlx::Error) -> LatencyError {
    LatencyError::Database(e.to_string())
}
