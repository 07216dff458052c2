//! End-to-end scenarios against an in-process mock orchestration server:
//! registration, a poll round, dispatch, and result submission.
#![allow(unused_crate_dependencies)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use workbridge_engine::{Client, ClientConfig, WorkerConfig};

#[derive(Default)]
struct MockState {
    registrations: AtomicUsize,
    poll_calls: AtomicUsize,
    submitted: Mutex<Vec<Value>>,
}

async fn register(State(state): State<Arc<MockState>>, Json(_body): Json<Value>) -> Json<Value> {
    state.registrations.fetch_add(1, Ordering::SeqCst);
    Json(json!({"status": "ok"}))
}

async fn poll(State(state): State<Arc<MockState>>, Json(_sizes): Json<Value>) -> Json<Value> {
    let call = state.poll_calls.fetch_add(1, Ordering::SeqCst);
    if call == 0 {
        Json(json!([{
            "processId": "proc-1",
            "stepId": "step-1",
            "stepExecutionId": 1,
            "stepName": "echo",
            "stepNamespace": "default",
            "inputParam": {"message": "hi"},
        }]))
    } else {
        Json(json!([]))
    }
}

async fn bulk_results(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    let mut submitted = state.submitted.lock().await;
    let mut results = serde_json::Map::new();
    if let Value::Array(items) = &body {
        for item in items {
            let step_id = item["stepId"].as_str().unwrap_or_default().to_string();
            results.insert(step_id, json!({"statusCode": 200, "errorMessage": ""}));
            submitted.push(item.clone());
        }
    }
    Json(Value::Object(results))
}

async fn spawn_mock_server() -> (SocketAddr, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/clients/register", put(register))
        .route("/api/clients/poll", post(poll))
        .route("/api/clients/bulkResults", post(bulk_results))
        .with_state(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

#[tokio::test]
async fn registers_polls_dispatches_and_submits_a_result() {
    let (addr, state) = spawn_mock_server().await;

    let config = ClientConfig::new("client-1", "token-1")
        .base_url(format!("http://{}", addr.ip()))
        .port(addr.port())
        .delay_millis(20);
    let client = Client::new("org-1", config).unwrap();

    client
        .register::<Value, Value, _, _>(WorkerConfig::new("echo"), |input: Value| async move { input })
        .unwrap();

    let handle = client.handle();
    let driver = tokio::spawn(async move { client.start().await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.stop();
    tokio::time::timeout(Duration::from_secs(2), driver)
        .await
        .expect("client did not shut down within 2s")
        .unwrap();

    assert!(state.registrations.load(Ordering::SeqCst) >= 1);
    assert!(state.poll_calls.load(Ordering::SeqCst) >= 1);

    let submitted = state.submitted.lock().await;
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0]["stepId"], json!("step-1"));
}

#[tokio::test]
async fn stop_before_start_completes_is_idempotent_and_clean() {
    let (addr, _state) = spawn_mock_server().await;
    let config = ClientConfig::new("client-2", "token-2")
        .base_url(format!("http://{}", addr.ip()))
        .port(addr.port())
        .delay_millis(10);
    let client = Client::new("org-1", config).unwrap();
    client
        .register_value(WorkerConfig::new("noop"), |value| async move {
            workbridge_engine::WorkerOutcome::Value(value)
        })
        .unwrap();

    let handle = client.handle();
    handle.stop();
    handle.stop();

    let driver = tokio::spawn(async move { client.start().await });
    tokio::time::timeout(Duration::from_secs(2), driver)
        .await
        .expect("client did not shut down within 2s")
        .unwrap();
}
