//! Timeout API handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use fanout_core::TimeoutDecision;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TimeoutsResponse {
    pub adaptive_enabled: bool,
    pub decisions: Vec<TimeoutDecision>,
}

/// GET /api/v1/timeouts
///
/// Cached timeout decisions, sorted by provider.
pub async fn list_timeouts(State(state): State<Arc<AppState>>) -> Json<TimeoutsResponse> {
    Json(TimeoutsResponse {
        adaptive_enabled: state.config().timeouts.adaptive_enabled,
        decisions: state.timeouts().decisions(),
    })
}
