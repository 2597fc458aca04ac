// ABOUTME: Health, readiness, liveness, and metrics handlers.
// ABOUTME: /health probes the backend live, /ready reads cached link state, /live always answers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde_json::json;

use crate::app_state::SharedState;

/// GET /health - Live round trip to the backend.
pub async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let report = state.health.health().await;
    let (status, backend) = if report.is_healthy() {
        (StatusCode::OK, "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "disconnected")
    };

    (
        status,
        Json(json!({
            "status": report.status,
            "timestamp": report.timestamp,
            "checks": { "backend": backend, "link": report.link },
        })),
    )
}

/// GET /ready - Last observed link state; no backend call.
pub async fn ready(State(state): State<SharedState>) -> impl IntoResponse {
    let readiness = state.health.ready();
    if readiness.ready {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "reason": format!("backend link is {}", readiness.link),
            })),
        )
    }
}

/// GET /live - Process is up.
pub async fn live() -> Json<serde_json::Value> {
    Json(json!({ "status": "alive" }))
}

/// GET /metrics - Uptime plus backend link state and per-operation counters.
pub async fn metrics(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let link = state.link();
    Json(json!({
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "backend": {
            "target": link.describe(),
            "state": link.state(),
            "connected": link.is_ready(),
            "connectAttempts": link.connect_attempts(),
            "operations": link.stats(),
        },
        "timestamp": Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::app_state::{AppState, SharedState};
    use crate::routes::create_router;
    use axum::body::Body;
    use daybook_store::{BackendLink, LinkConfig, MemoryBackend};
    use http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn unconnected_state(backend: &Arc<MemoryBackend>) -> SharedState {
        let link = BackendLink::new(Arc::new(backend.connector()), LinkConfig::default());
        Arc::new(AppState::new(link, false))
    }

    async fn get(state: &SharedState, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = create_router(Arc::clone(state))
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn probes_when_connected() {
        let backend = MemoryBackend::new();
        let state = unconnected_state(&backend);
        state.link().connect().await.unwrap();

        let (status, json) = get(&state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["checks"]["backend"], "connected");

        let (status, json) = get(&state, "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ready");
    }

    #[tokio::test]
    async fn degraded_mode_still_answers() {
        let backend = MemoryBackend::new();
        let state = unconnected_state(&backend);

        let (status, json) = get(&state, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "degraded");

        let (status, json) = get(&state, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "not ready");
        assert_eq!(json["reason"], "backend link is disconnected");

        let (status, json) = get(&state, "/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "alive");
    }

    #[tokio::test]
    async fn health_probes_live_while_ready_is_cached() {
        let backend = MemoryBackend::new();
        let state = unconnected_state(&backend);
        state.link().connect().await.unwrap();
        backend.set_online(false);

        let (status, _) = get(&state, "/ready").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get(&state, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn metrics_reports_link_and_operations() {
        let backend = MemoryBackend::new();
        let state = unconnected_state(&backend);
        state.link().connect().await.unwrap();
        get(&state, "/health").await;

        let (status, json) = get(&state, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["backend"]["state"], "ready");
        assert_eq!(json["backend"]["connected"], true);
        assert_eq!(json["backend"]["connectAttempts"], 1);
        assert_eq!(json["backend"]["operations"]["ping"]["calls"], 1);
    }
}
