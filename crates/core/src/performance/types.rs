use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::time::Instant;

use crate::config::ResolvedSearchConfig;
use crate::provider::{ErrorKind, ProviderId};

/// Score given to providers with no recorded outcomes.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// One entry of a provider's rolling outcome window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeSample {
    pub success: bool,
    pub result_count: u32,
    pub duration_ms: u64,
}

/// Most recent failure of a provider.
#[derive(Debug, Clone, Serialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Health state of one provider. Only the tracker mutates it.
#[derive(Debug, Default)]
pub struct PerformanceRecord {
    pub consecutive_failures: u32,
    pub penalty_until: Option<Instant>,
    /// Newest sample last.
    pub recent: VecDeque<OutcomeSample>,
    pub last_score: Option<f64>,
    pub total_successes: u64,
    pub total_failures: u64,
    pub last_error: Option<LastError>,
}

impl PerformanceRecord {
    pub(crate) fn push(&mut self, sample: OutcomeSample, window_size: usize) {
        self.recent.push_back(sample);
        while self.recent.len() > window_size {
            self.recent.pop_front();
        }
    }

    pub fn is_penalized(&self, now: Instant) -> bool {
        self.penalty_until.is_some_and(|until| now < until)
    }

    pub fn has_data(&self) -> bool {
        self.total_successes + self.total_failures > 0
    }

    /// Mean duration of the successful calls in the window.
    pub fn mean_success_ms(&self) -> Option<u64> {
        let (sum, count) = self
            .recent
            .iter()
            .filter(|s| s.success)
            .fold((0u64, 0u64), |(sum, count), s| {
                (sum.saturating_add(s.duration_ms), count + 1)
            });
        (count > 0).then(|| sum / count)
    }
}

/// Tunables of the scoring function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    /// Weight multiplier per step back in the window.
    pub recency_decay: f64,
    /// Fraction of the score the latency penalty can remove.
    pub latency_weight: f64,
}

/// Score in `[0, 100]` from a rolling outcome window.
///
/// Recency-weighted success rate (a success with zero results counts half),
/// reduced by up to `latency_weight` as the mean success latency approaches
/// `slow_threshold_ms`. An empty window scores [`NEUTRAL_SCORE`].
pub fn score(
    recent: &VecDeque<OutcomeSample>,
    weights: ScoreWeights,
    slow_threshold_ms: Option<u64>,
) -> f64 {
    if recent.is_empty() {
        return NEUTRAL_SCORE;
    }

    let mut weight = 1.0;
    let mut total_weight = 0.0;
    let mut weighted_success = 0.0;
    let mut success_ms = 0.0;
    let mut success_weight = 0.0;

    for sample in recent.iter().rev() {
        let value = match (sample.success, sample.result_count) {
            (false, _) => 0.0,
            (true, 0) => 0.5,
            (true, _) => 1.0,
        };
        weighted_success += weight * value;
        total_weight += weight;
        if sample.success {
            success_ms += weight * sample.duration_ms as f64;
            success_weight += weight;
        }
        weight *= weights.recency_decay;
    }

    let success_rate = weighted_success / total_weight;

    let latency_penalty = match slow_threshold_ms {
        Some(slow) if slow > 0 && success_weight > 0.0 => {
            let mean = success_ms / success_weight;
            weights.latency_weight * (mean / slow as f64).min(1.0)
        }
        _ => 0.0,
    };

    (100.0 * success_rate * (1.0 - latency_penalty)).clamp(0.0, 100.0)
}

/// Ranking options for [`super::PerformanceTracker::select_providers`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SelectionOptions {
    pub top_n: Option<usize>,
    pub min_score: Option<u32>,
    pub slow_threshold_ms: Option<u64>,
}

impl From<&ResolvedSearchConfig> for SelectionOptions {
    fn from(config: &ResolvedSearchConfig) -> Self {
        Self {
            top_n: config.top_n,
            min_score: config.min_score,
            slow_threshold_ms: config.slow_threshold_ms,
        }
    }
}

/// Provider health as exposed by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider: ProviderId,
    pub score: f64,
    pub penalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_remaining_ms: Option<u64>,
    pub consecutive_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub window_samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_success_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEIGHTS: ScoreWeights = ScoreWeights {
        recency_decay: 0.85,
        latency_weight: 0.25,
    };

    fn window(samples: &[(bool, u32, u64)]) -> VecDeque<OutcomeSample> {
        samples
            .iter()
            .map(|&(success, result_count, duration_ms)| OutcomeSample {
                success,
                result_count,
                duration_ms,
            })
            .collect()
    }

    #[test]
    fn test_empty_window_is_neutral() {
        assert_eq!(score(&VecDeque::new(), WEIGHTS, Some(5_000)), NEUTRAL_SCORE);
    }

    #[test]
    fn test_all_fast_successes_score_high() {
        let w = window(&[(true, 10, 0); 5]);
        assert_eq!(score(&w, WEIGHTS, Some(5_000)), 100.0);
    }

    #[test]
    fn test_all_failures_score_zero() {
        let w = window(&[(false, 0, 1_000); 5]);
        assert_eq!(score(&w, WEIGHTS, Some(5_000)), 0.0);
    }

    #[test]
    fn test_empty_success_counts_half() {
        let w = window(&[(true, 0, 0); 3]);
        assert_eq!(score(&w, WEIGHTS, None), 50.0);
    }

    #[test]
    fn test_recent_outcomes_weigh_more() {
        // Oldest first.
        let recovering = window(&[(false, 0, 0), (false, 0, 0), (true, 5, 0), (true, 5, 0)]);
        let degrading = window(&[(true, 5, 0), (true, 5, 0), (false, 0, 0), (false, 0, 0)]);
        assert!(score(&recovering, WEIGHTS, None) > score(&degrading, WEIGHTS, None));
    }

    #[test]
    fn test_latency_penalty() {
        let fast = window(&[(true, 5, 500); 4]);
        let slow = window(&[(true, 5, 10_000); 4]);
        assert!(score(&fast, WEIGHTS, Some(5_000)) > score(&slow, WEIGHTS, Some(5_000)));
        // Full penalty caps at latency_weight.
        assert_eq!(score(&slow, WEIGHTS, Some(5_000)), 75.0);
        // No threshold, no penalty.
        assert_eq!(score(&slow, WEIGHTS, None), 100.0);
    }

    #[test]
    fn test_record_window_is_bounded() {
        let mut record = PerformanceRecord::default();
        for i in 0..10 {
            record.push(
                OutcomeSample {
                    success: true,
                    result_count: 1,
                    duration_ms: i,
                },
                4,
            );
        }
        assert_eq!(record.recent.len(), 4);
        assert_eq!(record.recent.front().unwrap().duration_ms, 6);
        assert_eq!(record.mean_success_ms(), Some(7)); // (6+7+8+9)/4
    }
}
