// ABOUTME: End-to-end smoke test for the daybook journal lifecycle.
// ABOUTME: Drives create, update, delete, reconcile, and probes through the router over an in-memory backend.

use std::sync::Arc;

use axum::body::Body;
use daybook_core::keys;
use daybook_server::{AppState, create_router};
use daybook_store::{BackendLink, LinkConfig, MemoryBackend};
use http::Request;
use tower::ServiceExt;

/// Helper to create a connected AppState over a fresh in-memory backend.
async fn test_app_state() -> (Arc<AppState>, Arc<MemoryBackend>) {
    let backend = MemoryBackend::new();
    let link = BackendLink::new(Arc::new(backend.connector()), LinkConfig::default());
    link.connect().await.unwrap();
    (Arc::new(AppState::new(link, false)), backend)
}

/// Helper to extract JSON body from a response.
async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn smoke_test_full_lifecycle() {
    let (state, backend) = test_app_state().await;

    // 1. Create an entry with only the required fields
    let resp = create_router(Arc::clone(&state))
        .oneshot(json_request(
            "POST",
            "/api/journals/u1",
            serde_json::json!({ "title": "Day 1", "content": "Hello" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "create should return 201");
    let json = json_body(resp).await;
    let entry = &json["entry"];
    let id = entry["id"].as_str().unwrap().to_string();
    assert_eq!(entry["mood"], "neutral");
    assert_eq!(entry["tags"], serde_json::json!([]));
    assert_eq!(entry["createdAt"], entry["updatedAt"]);
    let created_at = entry["createdAt"].as_str().unwrap().to_string();

    // 2. Both records exist in the backend
    assert!(backend.raw_get(&keys::entry_key("u1", &id)).is_some());
    assert!(backend.raw_get(&keys::index_key("u1")).is_some());

    // 3. Update only the content
    let resp = create_router(Arc::clone(&state))
        .oneshot(json_request(
            "PUT",
            &format!("/api/journals/u1/{}", id),
            serde_json::json!({ "content": "Hello world" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "update should return 200");
    let json = json_body(resp).await;
    assert_eq!(json["entry"]["title"], "Day 1");
    assert_eq!(json["entry"]["content"], "Hello world");
    assert_eq!(json["entry"]["createdAt"], created_at.as_str());
    let updated_at: chrono::DateTime<chrono::Utc> =
        json["entry"]["updatedAt"].as_str().unwrap().parse().unwrap();
    let created_at: chrono::DateTime<chrono::Utc> = created_at.parse().unwrap();
    assert!(updated_at > created_at, "updatedAt should advance");

    // 4. The list carries the refreshed summary
    let resp = create_router(Arc::clone(&state))
        .oneshot(Request::get("/api/journals/u1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json = json_body(resp).await;
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id.as_str());
    let listed_at: chrono::DateTime<chrono::Utc> =
        entries[0]["updatedAt"].as_str().unwrap().parse().unwrap();
    assert_eq!(listed_at, updated_at);

    // 5. Delete, then the entry is gone from both lookups
    let resp = create_router(Arc::clone(&state))
        .oneshot(
            Request::delete(format!("/api/journals/u1/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "delete should return 200");

    let resp = create_router(Arc::clone(&state))
        .oneshot(
            Request::get(format!("/api/journals/u1/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 404, "deleted entry should be gone");

    let resp = create_router(Arc::clone(&state))
        .oneshot(Request::get("/api/journals/u1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = json_body(resp).await;
    assert!(json["entries"].as_array().unwrap().is_empty());

    // 6. Reconciling a consistent journal changes nothing
    let resp = create_router(Arc::clone(&state))
        .oneshot(
            Request::post("/api/journals/u1/reconcile")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let report = json_body(resp).await;
    assert_eq!(report["entries"], 0);
    assert_eq!(report["added"], 0);
    assert_eq!(report["removed"], 0);

    // 7. Probes agree the backend is up
    let resp = create_router(Arc::clone(&state))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "health should return 200");

    state.link().close().await;
    let resp = create_router(Arc::clone(&state))
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 503, "closed link should not be ready");
}
