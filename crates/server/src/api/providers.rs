//! Provider API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use fanout_core::{
    performance::ProviderHealth, provider::ProviderStatus, ProviderClass, ProviderId,
};

use super::handlers::ErrorResponse;
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ProviderResponse {
    pub id: ProviderId,
    pub name: String,
    pub class: ProviderClass,
    pub enabled: bool,
    /// Last computed timeout budget (class default before the first search).
    pub timeout_ms: u64,
    pub health: ProviderHealth,
}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderResponse>,
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub id: ProviderId,
    /// Whether the provider had any recorded history.
    pub reset: bool,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn not_found(id: &ProviderId) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Provider not found: {}", id),
        }),
    )
}

fn to_response(state: &AppState, status: ProviderStatus, health: ProviderHealth) -> ProviderResponse {
    let timeout_ms = state.timeouts().cached_timeout(&status.id).as_millis() as u64;
    ProviderResponse {
        id: status.id,
        name: status.name,
        class: status.class,
        enabled: status.enabled,
        timeout_ms,
        health,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/providers
///
/// List registered providers with class, enabled flag and health.
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    let statuses = state.registry().status().await;
    let ids: Vec<ProviderId> = statuses.iter().map(|s| s.id.clone()).collect();
    let health = state.tracker().snapshot(&ids);

    let providers = statuses
        .into_iter()
        .zip(health)
        .map(|(status, health)| to_response(&state, status, health))
        .collect();

    Json(ProvidersResponse { providers })
}

/// PUT /api/v1/providers/{id}/enabled
pub async fn set_enabled(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SetEnabledRequest>,
) -> Result<Json<ProviderResponse>, ApiError> {
    let id = ProviderId::normalize(&id);
    state
        .registry()
        .set_enabled(&id, body.enabled)
        .await
        .map_err(|e| not_found(&e.0))?;

    info!(provider = %id, enabled = body.enabled, "Provider toggled");

    let status = state
        .registry()
        .status()
        .await
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| not_found(&id))?;
    let health = state
        .tracker()
        .snapshot(std::slice::from_ref(&id))
        .into_iter()
        .next()
        .ok_or_else(|| not_found(&id))?;

    Ok(Json(to_response(&state, status, health)))
}

/// POST /api/v1/providers/{id}/reset
///
/// Clear the provider's performance record, lifting any penalty.
pub async fn reset_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let id = ProviderId::normalize(&id);
    if state.registry().get(&id).is_none() {
        return Err(not_found(&id));
    }

    let reset = state.tracker().reset(&id);
    state.timeouts().invalidate(&id);

    Ok(Json(ResetResponse { id, reset }))
}
