//! Adaptive timeout engine.
//!
//! Budgets are `percentile * (1 + buffer)` over a trailing window of successful
//! calls, clamped into the provider class bounds, with the class default used
//! when adaptive timeouts are off or data is insufficient.

mod engine;
mod types;

pub use engine::AdaptiveTimeoutEngine;
pub use types::{compute_timeout, TimeoutDecision, TimeoutParams, TimeoutSource};
