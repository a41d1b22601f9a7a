//! Testing utilities and mock implementations.
//!
//! Lets the orchestrator be exercised end to end without real providers.
//!
//! # Example
//!
//! ```rust,ignore
//! use fanout_core::testing::{fixtures, MockProvider};
//!
//! let fast = MockProvider::new("YTS").with_results(vec![fixtures::result_record("a")]);
//! let broken = MockProvider::new("EZTV").with_error(ProviderError::Timeout);
//! ```

mod mock_provider;

pub use mock_provider::{MockProvider, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::provider::ResultRecord;

    /// Create a result record with reasonable defaults.
    pub fn result_record(title: &str) -> ResultRecord {
        ResultRecord {
            title: title.to_string(),
            info_hash: format!("{:040x}", fnv1a(title)),
            size_bytes: 1024 * 1024 * 700,
            seeders: 25,
            peers: 5,
            source: "mock".to_string(),
            languages: Vec::new(),
        }
    }

    /// Create `count` distinct records whose titles start with `prefix`.
    pub fn result_records(prefix: &str, count: usize) -> Vec<ResultRecord> {
        (0..count)
            .map(|i| result_record(&format!("{} {}", prefix, i)))
            .collect()
    }

    fn fnv1a(s: &str) -> u128 {
        s.bytes()
            .fold(0xcbf29ce484222325u128, |h, b| (h ^ b as u128).wrapping_mul(0x100000001b3))
    }
}
