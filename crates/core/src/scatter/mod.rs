//! Scatter-gather search.
//!
//! A search fans out to one task per provider and language partition, each
//! with its own adaptive budget and cancellation scope, then merges whatever
//! succeeded. A failing provider never fails the search.

mod background;
mod coalesce;
mod orchestrator;
mod outcome;
mod types;

pub use background::{BackgroundScheduler, PostSearchHook};
pub use orchestrator::{ScatterGather, ScatterPlan};
pub use outcome::TaskOutcome;
pub use types::{AdmissionMode, ScatterResult, SearchRequest, SearchStatus, TaskSummary};
