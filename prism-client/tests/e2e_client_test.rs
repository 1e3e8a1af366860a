//! End-to-end client tests.
//!
//! Each test starts a real Axum HTTP server on a random port that mimics the
//! search service endpoints, and drives it through the client over reqwest.
//! Unreachable nodes are simulated with ports that nothing listens on.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use prism_client::{
    ClientConfig, ClientError, ExportOptions, ImportAction, ImportOptions, ImportRecordResult, Method,
    NodeConfig, RequestOptions, SearchClient,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const EXPORT_BODY: &str = "{\"id\":\"1\",\"title\":\"Dune\"}\n{\"id\":\"2\",\"title\":\"Solaris\"}";

#[derive(Clone, Default)]
struct ServiceState {
    hits: Arc<AtomicUsize>,
}

async fn health(State(state): State<ServiceState>) -> Json<Value> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({"ok": true}))
}

async fn slow(State(state): State<ServiceState>) -> Json<Value> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({"ok": true}))
}

async fn whoami(headers: HeaderMap) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({"authorization": auth}))
}

/// Fails every record carrying `"fail": true`, like the service does for
/// schema violations.
async fn import(
    State(state): State<ServiceState>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    state.hits.fetch_add(1, Ordering::SeqCst);

    if collection == "missing" {
        return (
            StatusCode::NOT_FOUND,
            json!({"message": "Collection not found"}).to_string(),
        );
    }

    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("text/plain") {
        return (
            StatusCode::BAD_REQUEST,
            json!({"message": "expected text/plain"}).to_string(),
        );
    }

    let text = String::from_utf8_lossy(&body);
    let lines: Vec<String> = text
        .lines()
        .map(|line| match serde_json::from_str::<Value>(line) {
            Ok(doc) if doc.get("fail") == Some(&Value::Bool(true)) => json!({
                "success": false,
                "error": "Document rejected",
                "document": doc,
                "code": 422,
            })
            .to_string(),
            Ok(_) => json!({"success": true}).to_string(),
            Err(e) => json!({
                "success": false,
                "error": e.to_string(),
                "document": line,
                "code": 400,
            })
            .to_string(),
        })
        .collect();

    (StatusCode::OK, lines.join("\n"))
}

async fn export(State(state): State<ServiceState>) -> &'static str {
    state.hits.fetch_add(1, Ordering::SeqCst);
    EXPORT_BODY
}

/// Start a mock search node and return its address and hit counter.
async fn start_node() -> (NodeConfig, Arc<AtomicUsize>) {
    let state = ServiceState::default();
    let hits = Arc::clone(&state.hits);

    let router = Router::new()
        .route("/health", get(health))
        .route("/slow", get(slow))
        .route("/whoami", get(whoami))
        .route("/collections/:name/documents/import", post(import))
        .route("/collections/:name/documents/export", get(export))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (NodeConfig::from_url(&format!("http://{}", addr)).unwrap(), hits)
}

/// Address of a port nobody listens on.
async fn dead_node() -> NodeConfig {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    NodeConfig::from_url(&format!("http://{}", addr)).unwrap()
}

fn client(nodes: Vec<NodeConfig>) -> SearchClient {
    let mut config = ClientConfig::with_nodes(nodes);
    config.retry_interval_ms = 10;
    config.connection_timeout_ms = 1000;
    SearchClient::new(config).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_round_robin() {
    let (a, hits_a) = start_node().await;
    let (b, hits_b) = start_node().await;
    let client = client(vec![a, b]);

    for _ in 0..10 {
        assert!(client.health().await.unwrap());
    }

    assert_eq!(hits_a.load(Ordering::SeqCst), 5);
    assert_eq!(hits_b.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_failover_to_live_node() {
    let dead = dead_node().await;
    let (live, hits) = start_node().await;
    let client = client(vec![dead, live]);

    for _ in 0..4 {
        assert!(client.health().await.unwrap());
    }
    assert_eq!(hits.load(Ordering::SeqCst), 4);

    let status = client.node_status();
    assert!(!status[0].healthy);
    assert!(status[0].unhealthy_for.is_some());
    assert!(status[1].healthy);
}

#[tokio::test]
async fn test_nearest_node_preferred() {
    let (near, near_hits) = start_node().await;
    let (far, far_hits) = start_node().await;
    let mut config = ClientConfig::with_nodes(vec![far]);
    config.nearest_node = Some(near);
    let client = SearchClient::new(config).unwrap();

    for _ in 0..3 {
        client.health().await.unwrap();
    }
    assert_eq!(near_hits.load(Ordering::SeqCst), 3);
    assert_eq!(far_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_all_nodes_down() {
    let client = client(vec![dead_node().await, dead_node().await]);

    let err = client.health().await.unwrap_err();
    match err {
        ClientError::ServiceUnavailable { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(last.is_retryable());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_per_request_timeout() {
    let (node, hits) = start_node().await;
    let client = client(vec![node]);

    let err = client
        .api()
        .perform_request(
            Method::Get,
            "/slow",
            RequestOptions {
                timeout: Some(Duration::from_millis(100)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::ServiceUnavailable { attempts: 1, .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_api_key_sent_as_bearer_token() {
    let (node, _) = start_node().await;
    let mut config = ClientConfig::with_nodes(vec![node]);
    config.api_key = Some("test_admin_key".to_string());
    let client = SearchClient::new(config).unwrap();

    let body: Value = client.api().get("/whoami", Vec::new()).await.unwrap();
    assert_eq!(body["authorization"], "Bearer test_admin_key");
}

#[tokio::test]
async fn test_unknown_route_is_not_retried() {
    let (a, hits_a) = start_node().await;
    let (b, hits_b) = start_node().await;
    let client = client(vec![a, b]);

    let err = client
        .api()
        .get::<Value>("/does-not-exist", Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::NotFound(_)));
    assert_eq!(
        hits_a.load(Ordering::SeqCst) + hits_b.load(Ordering::SeqCst),
        0
    );
    let status = client.node_status();
    assert!(status.iter().all(|s| s.healthy));
}

#[tokio::test]
async fn test_bad_header_does_not_mark_nodes_down() {
    let (a, hits_a) = start_node().await;
    let (b, hits_b) = start_node().await;
    let client = client(vec![a, b]);

    let err = client
        .api()
        .perform_request(
            Method::Get,
            "/health",
            RequestOptions {
                headers: vec![("bad header".to_string(), "x".to_string())],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidRequest(_)));
    assert_eq!(
        hits_a.load(Ordering::SeqCst) + hits_b.load(Ordering::SeqCst),
        0
    );
    assert!(client.node_status().iter().all(|s| s.healthy));
    assert!(client.health().await.unwrap());
}

#[tokio::test]
async fn test_import_all_success() {
    let (node, _) = start_node().await;
    let docs = client(vec![node]).collection("books").documents();

    let records = vec![
        json!({"id": "a", "title": "Dune"}),
        json!({"id": "b", "title": "Solaris"}),
        json!({"id": "c", "title": "Hyperion"}),
    ];
    let results = docs
        .import(&records, &ImportOptions::with_action(ImportAction::Upsert))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(ImportRecordResult::is_success));
}

#[tokio::test]
async fn test_import_partial_failure_keeps_positions() {
    let (node, _) = start_node().await;
    let docs = client(vec![node]).collection("books").documents();

    let records = vec![
        json!({"id": "a"}),
        json!({"id": "b", "fail": true}),
        json!({"id": "c"}),
    ];
    let err = docs.import(&records, &ImportOptions::default()).await.unwrap_err();

    let ClientError::Import(failure) = err else {
        panic!("expected an aggregate import error");
    };
    assert_eq!(failure.summary(), "2 succeeded, 1 failed");
    assert_eq!(failure.results().len(), 3);
    assert!(failure.results()[0].is_success());
    assert_eq!(
        failure.results()[1],
        ImportRecordResult::Failure {
            error: "Document rejected".to_string(),
            code: 422,
            document: json!({"id": "b", "fail": true}),
        }
    );
    assert!(failure.results()[2].is_success());
}

#[tokio::test]
async fn test_import_raw_returns_response_text() {
    let (node, _) = start_node().await;
    let docs = client(vec![node]).collection("books").documents();

    let text = "{\"id\":\"a\"}\nthis is not json";
    let response = docs.import_raw(text, &ImportOptions::default()).await.unwrap();

    let lines: Vec<&str> = response.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "{\"success\":true}");
    assert!(lines[1].contains("\"success\":false"));
}

#[tokio::test]
async fn test_import_into_missing_collection() {
    let (node, _) = start_node().await;
    let docs = client(vec![node]).collection("missing").documents();

    let err = docs
        .import(&[json!({"id": "a"})], &ImportOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound(ref m) if m == "Collection not found"));
}

#[tokio::test]
async fn test_export_returns_raw_body() {
    let (node, _) = start_node().await;
    let docs = client(vec![node]).collection("books").documents();

    let body = docs.export(&ExportOptions::default()).await.unwrap();
    assert_eq!(body, EXPORT_BODY);

    let records: Vec<Value> = docs.export_records(&ExportOptions::default()).await.unwrap();
    assert_eq!(records[1]["title"], "Solaris");
}

#[tokio::test]
async fn test_concurrent_requests_share_health() {
    let dead = dead_node().await;
    let (live, hits) = start_node().await;
    let client = client(vec![dead, live]);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let client = client.clone();
        handles.push(tokio::spawn(async move { client.health().await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    assert_eq!(hits.load(Ordering::SeqCst), 16);
}
