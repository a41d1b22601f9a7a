//! Latency metrics store.
//!
//! Append-only log of per-call latency samples with buffered batch writes,
//! percentile queries over a trailing window and retention pruning. Two
//! backends are available: SQLite for single-instance deployments and
//! PostgreSQL for instances sharing history.

mod backend;
mod percentile;
mod postgres;
mod sqlite;
mod store;
mod types;

pub use backend::{create_latency_backend, LatencyBackend};
pub use percentile::nearest_rank;
pub use postgres::PostgresLatencyBackend;
pub use sqlite::SqliteLatencyBackend;
pub use store::LatencyStore;
pub use types::{LatencyError, LatencyOutcome, LatencySample};
