use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::provider::ProviderId;

use super::{LatencyBackend, LatencyError, LatencySample};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS latency_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    outcome TEXT NOT NULL,
    result_count INTEGER NOT NULL,
    recorded_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_latency_samples_lookup
    ON latency_samples(provider, outcome, recorded_at);
CREATE INDEX IF NOT EXISTS idx_latency_samples_recorded_at
    ON latency_samples(recorded_at);
"#;

/// SQLite-backed latency store, for single-instance deployments.
pub struct SqliteLatencyBackend {
    conn: Mutex<Connection>,
}

impl SqliteLatencyBackend {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, LatencyError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// Create an in-memory store (useful for testing)
    pub fn in_memory() -> Result<Self, LatencyError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, LatencyError> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, LatencyError> {
        self.conn
            .lock()
            .map_err(|_| LatencyError::Database("connection mutex poisoned".to_string()))
    }

    /// Total number of stored samples.
    pub fn count(&self) -> Result<u64, LatencyError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM latency_samples", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(count as u64)
    }
}

#[async_trait]
impl LatencyBackend for SqliteLatencyBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert_batch(&self, samples: &[LatencySample]) -> Result<(), LatencyError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO latency_samples (provider, duration_ms, outcome, result_count, recorded_at) VALUES (?, ?, ?, ?, ?)",
                )
                .map_err(db_err)?;
            for sample in samples {
                stmt.execute(params![
                    sample.provider.as_str(),
                    sample.duration_ms as i64,
                    sample.outcome.as_str(),
                    sample.result_count as i64,
                    sample.recorded_at_millis(),
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)
    }

    async fn success_durations(
        &self,
        provider: &ProviderId,
        since: DateTime<Utc>,
    ) -> Result<Vec<u64>, LatencyError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT duration_ms FROM latency_samples WHERE provider = ? AND outcome = 'success' AND recorded_at >= ? ORDER BY duration_ms ASC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![provider.as_str(), since.timestamp_millis()], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(db_err)?;

        let durations = rows
            .map(|r| r.map(|ms| ms.max(0) as u64).map_err(db_err))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(durations)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, LatencyError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM latency_samples WHERE recorded_at < ?",
                params![cutoff.timestamp_millis()],
            )
            .map_err(db_err)?;
        Ok(deleted as u64)
    }
}

fn db_err(e: rusqlite::Error) -> LatencyError {
    LatencyError::Database(e.to_string())
}
