//! Search API handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use fanout_core::{ScatterResult, SearchRequest};

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// POST /api/v1/search
///
/// Run a coalesced scatter-gather search across the selected providers.
/// Provider failures are reported per task; the request itself only fails on
/// invalid input.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<ScatterResult>, (StatusCode, Json<ErrorResponse>)> {
    if body.query.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Query must not be empty".to_string(),
            }),
        ));
    }

    // Cancelled if the client goes away and this handler is dropped.
    let cancel = state.runtime().shutdown_token().child_token();
    let _guard = cancel.clone().drop_guard();

    let result = state.scatter().search_coalesced(body, cancel).await;
    Ok(Json(result))
}
