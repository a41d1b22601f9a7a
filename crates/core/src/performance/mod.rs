//! Performance tracking and admission control.
//!
//! Each provider has a rolling window of outcomes, a consecutive-failure
//! streak and a time-bounded penalty. The tracker answers whether a provider
//! is penalized and which subset of candidates to query by default.

mod tracker;
mod types;

pub use tracker::PerformanceTracker;
pub use types::{
    score, LastError, OutcomeSample, PerformanceRecord, ProviderHealth, ScoreWeights,
    SelectionOptions, NEUTRAL_SCORE,
};
