use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, providers, search, timeouts};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Search
        .route("/search", post(search::search))
        // Providers
        .route("/providers", get(providers::list_providers))
        .route("/providers/{id}/enabled", put(providers::set_enabled))
        .route("/providers/{id}/reset", post(providers::reset_provider))
        // Timeouts
        .route("/timeouts", get(timeouts::list_timeouts));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(metrics_middleware)),
        )
}
