#![allow(dead_code)] // Test helpers appear unused when compiled independently

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

const WAIT_ATTEMPTS: usize = 50;
const WAIT_DELAY: Duration = Duration::from_millis(100);

#[derive(Clone)]
struct SinkState {
    events: Arc<Mutex<Vec<Value>>>,
    fail_remaining: Arc<AtomicU32>,
}

/// In-process stand-in for the downstream collector. Records every NDJSON
/// line it accepts; can be scripted to fail the next N requests with 503.
pub struct MockSink {
    state: SinkState,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl MockSink {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }

    /// Make the next `n` ingest requests fail with 503
    pub fn fail_next(&self, n: u32) {
        self.state.fail_remaining.store(n, Ordering::SeqCst);
    }
}

/// Best-effort check for whether binding to loopback is permitted in the current sandbox.
pub async fn can_bind_loopback() -> bool {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(_) => true, // treat other errors as non-fatal for skipping
    }
}

/// Spawn the mock sink on an ephemeral port, return (handle, base URL)
pub async fn spawn_mock_sink() -> (MockSink, String) {
    let state = SinkState {
        events: Arc::new(Mutex::new(Vec::new())),
        fail_remaining: Arc::new(AtomicU32::new(0)),
    };

    let app = Router::new()
        .route("/v1/traces", post(ingest))
        .route("/v1/metrics", post(ingest))
        .route("/v1/logs", post(ingest))
        .route("/events", get(events))
        .route("/reset", post(reset))
        .route("/health", get(health))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock sink listener");
    let addr = listener.local_addr().expect("mock sink has a local addr");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = server.await {
            eprintln!("mock sink server error: {}", err);
        }
    });

    (
        MockSink {
            state,
            shutdown_tx,
            handle,
        },
        format!("http://{}", addr),
    )
}

/// Wait for a server to respond to /health
pub async fn wait_for_health(client: &Client, base_url: &str) {
    poll_until(|| async {
        client
            .get(format!("{}/health", base_url))
            .send()
            .await
            .ok()
            .map(|_| ())
    })
    .await
    .unwrap_or_else(|| panic!("timed out waiting for {} to be healthy", base_url));
}

/// Poll /events until we have at least `min_count` events
pub async fn wait_for_events(client: &Client, base_url: &str, min_count: usize) -> Vec<Value> {
    poll_until(|| async {
        match client.get(format!("{}/events", base_url)).send().await.ok() {
            Some(resp) => match resp.json::<Vec<Value>>().await.ok() {
                Some(events) if events.len() >= min_count => Some(events),
                _ => None,
            },
            None => None,
        }
    })
    .await
    .unwrap_or_else(|| panic!("timed out waiting for {} events at {}", min_count, base_url))
}

/// Fetch whatever the sink has right now
pub async fn current_events(client: &Client, base_url: &str) -> Vec<Value> {
    client
        .get(format!("{}/events", base_url))
        .send()
        .await
        .expect("failed to fetch events")
        .json()
        .await
        .expect("events response is JSON")
}

async fn poll_until<T, F, Fut>(mut f: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..WAIT_ATTEMPTS {
        if let Some(result) = f().await {
            return Some(result);
        }
        tokio::time::sleep(WAIT_DELAY).await;
    }
    None
}

async fn ingest(
    State(state): State<SinkState>,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, String)> {
    let scripted_failure = state
        .fail_remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if scripted_failure {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "scripted failure".to_string(),
        ));
    }

    let text = String::from_utf8_lossy(&body);
    let mut events = state.events.lock().await;
    for line in text.split('\n').filter(|l| !l.is_empty()) {
        let parsed: Value = serde_json::from_str(line)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        events.push(parsed);
    }

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

async fn events(State(state): State<SinkState>) -> Json<Vec<Value>> {
    let events = state.events.lock().await;
    Json(events.clone())
}

async fn reset(State(state): State<SinkState>) -> Json<Value> {
    let mut events = state.events.lock().await;
    events.clear();
    Json(serde_json::json!({ "status": "ok" }))
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
