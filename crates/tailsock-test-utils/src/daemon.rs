//! Mock `LocalAPI` daemon — an axum router over a Unix domain socket.
//!
//! Serves the `/localapi/v0/...` surface with the wire casing the real
//! `tailscaled` uses (`PascalCase` with stray acronym keys), so client tests
//! can observe normalization end to end without a real daemon.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use serde_json::{Value, json};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tracing::info;

/// Shared state behind the mock daemon's routes.
#[derive(Debug, Default)]
struct MockState {
    /// Waiting inbound files plus anything pushed via `file-put`.
    files: Mutex<HashMap<String, Bytes>>,
    /// Peers by tailnet IP, served from `status` and `whois`.
    peers: Mutex<HashMap<String, Value>>,
    /// Counter uploads received on `upload-client-metrics`.
    metric_uploads: Mutex<Vec<Value>>,
}

/// A scripted `tailscaled` stand-in.
#[derive(Debug, Clone, Default)]
pub struct MockDaemon {
    state: Arc<MockState>,
}

/// Running mock daemon; aborts the server task and unlinks the socket on
/// drop.
pub struct MockDaemonHandle {
    socket_path: PathBuf,
    task: JoinHandle<()>,
}

impl MockDaemonHandle {
    /// Socket path the mock is listening on.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for MockDaemonHandle {
    fn drop(&mut self) {
        self.task.abort();
        std::fs::remove_file(&self.socket_path).ok();
    }
}

impl MockDaemon {
    /// Create a mock with one peer at `100.64.0.2`.
    #[must_use]
    pub fn new() -> Self {
        let daemon = Self::default();
        daemon.add_peer(
            "100.64.0.2",
            json!({
                "ID": "node-peer-1",
                "HostName": "worker1",
                "DNSName": "worker1.example.ts.net",
                "TailscaleIPs": ["100.64.0.2"],
                "Online": true,
                "OS": "linux"
            }),
        );
        daemon
    }

    /// Register a peer served by `status` and `whois`.
    pub fn add_peer(&self, ip: &str, node: Value) {
        self.state
            .peers
            .lock()
            .unwrap()
            .insert(ip.to_string(), node);
    }

    /// Seed a waiting inbound file.
    pub fn add_waiting_file(&self, name: &str, contents: &[u8]) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(name.to_string(), Bytes::copy_from_slice(contents));
    }

    /// Contents of a stored file, if present.
    #[must_use]
    pub fn file_contents(&self, name: &str) -> Option<Vec<u8>> {
        self.state
            .files
            .lock()
            .unwrap()
            .get(name)
            .map(|b| b.to_vec())
    }

    /// Counter uploads the mock has received, in arrival order.
    #[must_use]
    pub fn metric_uploads(&self) -> Vec<Value> {
        self.state.metric_uploads.lock().unwrap().clone()
    }

    /// Bind the mock on a Unix socket and serve until the handle drops.
    ///
    /// Removes any stale socket file before binding.
    pub fn spawn(&self, socket_path: &Path) -> std::io::Result<MockDaemonHandle> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let listener = UnixListener::bind(socket_path)?;
        info!(path = %socket_path.display(), "mock localapi listening");

        let app = router(Arc::clone(&self.state));
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!(error = %e, "mock localapi server error");
            }
        });

        Ok(MockDaemonHandle {
            socket_path: socket_path.to_path_buf(),
            task,
        })
    }
}

fn router(state: Arc<MockState>) -> axum::Router {
    axum::Router::new()
        .route("/localapi/v0/status", get(handle_status))
        .route("/localapi/v0/whois", get(handle_whois))
        .route("/localapi/v0/metrics", get(handle_metrics))
        .route("/localapi/v0/goroutines", get(handle_goroutines))
        .route("/localapi/v0/files/", get(handle_list_files))
        .route(
            "/localapi/v0/files/{name}",
            get(handle_get_file).delete(handle_delete_file),
        )
        .route("/localapi/v0/file-put/{peer}/{name}", put(handle_file_put))
        .route("/localapi/v0/login-interactive", post(handle_login))
        .route("/localapi/v0/logout", post(handle_logout))
        .route(
            "/localapi/v0/upload-client-metrics",
            post(handle_metric_upload),
        )
        .with_state(state)
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_status(State(state): State<Arc<MockState>>) -> Json<Value> {
    let peers = state.peers.lock().unwrap();
    let peer_map: serde_json::Map<String, Value> = peers
        .values()
        .map(|node| {
            let id = node["ID"].as_str().unwrap_or("node-unknown").to_string();
            (id, node.clone())
        })
        .collect();

    Json(json!({
        "Version": "1.62.0-mock",
        "BackendState": "Running",
        "Self": {
            "ID": "node-self",
            "HostName": "mock-host",
            "DNSName": "mock-host.example.ts.net",
            "TailscaleIPs": ["100.64.0.1", "fd7a:115c:a1e0::1"],
            "Online": true
        },
        "Peer": peer_map,
        "CurrentTailnet": {
            "Name": "example.ts.net",
            "MagicDNSSuffix": "example.ts.net"
        }
    }))
}

async fn handle_whois(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let addr = params
        .get("addr")
        .ok_or((StatusCode::BAD_REQUEST, "missing addr".to_string()))?;
    let peers = state.peers.lock().unwrap();
    let node = peers
        .get(addr)
        .ok_or((StatusCode::NOT_FOUND, format!("no peer for {addr}")))?;
    Ok(Json(json!({
        "Node": node,
        "UserProfile": {
            "ID": 1001,
            "LoginName": "alice@example.com",
            "DisplayName": "Alice"
        }
    })))
}

async fn handle_metrics() -> String {
    "# TYPE mock_requests_total counter\nmock_requests_total 1\n".to_string()
}

async fn handle_goroutines() -> String {
    "goroutine 1 [running]:\nmain.main()\n".to_string()
}

async fn handle_list_files(State(state): State<Arc<MockState>>) -> Json<Value> {
    let files = state.files.lock().unwrap();
    let entries: Vec<Value> = files
        .iter()
        .map(|(name, contents)| json!({"Name": name, "Size": contents.len()}))
        .collect();
    Json(Value::Array(entries))
}

async fn handle_get_file(
    State(state): State<Arc<MockState>>,
    UrlPath(name): UrlPath<String>,
) -> Result<Bytes, (StatusCode, String)> {
    state
        .files
        .lock()
        .unwrap()
        .get(&name)
        .cloned()
        .ok_or((StatusCode::NOT_FOUND, format!("no file {name:?}")))
}

async fn handle_delete_file(
    State(state): State<Arc<MockState>>,
    UrlPath(name): UrlPath<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.files.lock().unwrap().remove(&name) {
        Some(_) => Ok(StatusCode::OK),
        None => Err((StatusCode::NOT_FOUND, format!("no file {name:?}"))),
    }
}

async fn handle_file_put(
    State(state): State<Arc<MockState>>,
    UrlPath((_peer, name)): UrlPath<(String, String)>,
    body: Bytes,
) -> StatusCode {
    state.files.lock().unwrap().insert(name, body);
    StatusCode::OK
}

async fn handle_login() -> StatusCode {
    StatusCode::OK
}

async fn handle_logout() -> StatusCode {
    StatusCode::OK
}

async fn handle_metric_upload(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> StatusCode {
    state.metric_uploads.lock().unwrap().push(body);
    StatusCode::OK
}
