// ABOUTME: Route definitions for the daybook HTTP API.
// ABOUTME: Assembles journal, probe, and metrics routes into a single Axum Router with request tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(api::probes::health))
        .route("/ready", get(api::probes::ready))
        .route("/live", get(api::probes::live))
        .route("/metrics", get(api::probes::metrics))
        .route(
            "/api/journals/{owner}",
            get(api::journals::list_entries).post(api::journals::create_entry),
        )
        .route(
            "/api/journals/{owner}/reconcile",
            post(api::journals::reconcile_owner),
        )
        .route(
            "/api/journals/{owner}/{id}",
            get(api::journals::get_entry)
                .put(api::journals::update_entry)
                .delete(api::journals::delete_entry),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
