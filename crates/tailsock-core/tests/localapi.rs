//! End-to-end tests against the mock daemon from `tailsock-test-utils`.

use std::time::Duration;

use hyper::body::Bytes;
use pretty_assertions::assert_eq;
use serde_json::json;

use tailsock_core::{LocalApi, LocalApiError, Platform, ProbePolicy, ProbeState};
use tailsock_test_utils::MockDaemon;
use tailsock_test_utils::daemon::MockDaemonHandle;
use tailsock_test_utils::tracing_setup::init_test_tracing;

fn fast_probe() -> ProbePolicy {
    ProbePolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(20),
    }
}

fn start(daemon: &MockDaemon) -> (tempfile::TempDir, MockDaemonHandle, LocalApi) {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("localapi.sock");
    let handle = daemon.spawn(&socket).unwrap();
    let api = LocalApi::builder()
        .platform(Platform::Unix)
        .socket_path(&socket)
        .probe_policy(fast_probe())
        .connect()
        .unwrap();
    (dir, handle, api)
}

#[tokio::test]
async fn status_comes_back_camel_cased() {
    let daemon = MockDaemon::new();
    let (_dir, _handle, api) = start(&daemon);
    api.wait_ready().await.unwrap();
    assert_eq!(api.probe_state(), ProbeState::Ready);

    let status = api.status().await.unwrap();
    assert_eq!(status["backendState"], "Running");
    assert_eq!(status["self"]["hostName"], "mock-host");
    assert_eq!(status["self"]["tailscaleIPs"][0], "100.64.0.1");
    // Wire keys are gone after normalization.
    assert!(status.get("BackendState").is_none());
    assert!(status["self"].get("HostName").is_none());
}

#[tokio::test]
async fn whois_finds_known_peer() {
    let daemon = MockDaemon::new();
    let (_dir, _handle, api) = start(&daemon);
    api.wait_ready().await.unwrap();

    let who = api.whois("100.64.0.2".parse().unwrap()).await.unwrap();
    assert_eq!(who["node"]["hostName"], "worker1");
    assert_eq!(who["userProfile"]["loginName"], "alice@example.com");
}

#[tokio::test]
async fn whois_unknown_peer_surfaces_daemon_error() {
    let daemon = MockDaemon::new();
    let (_dir, _handle, api) = start(&daemon);
    api.wait_ready().await.unwrap();

    let err = api.whois("100.64.0.99".parse().unwrap()).await.unwrap_err();
    match err {
        LocalApiError::Daemon { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("no peer"), "body: {body}");
        }
        other => panic!("expected daemon error, got {other:?}"),
    }
}

#[tokio::test]
async fn waiting_files_round_trip() {
    let daemon = MockDaemon::new();
    daemon.add_waiting_file("report.txt", b"hello from a peer");
    let (_dir, _handle, api) = start(&daemon);
    api.wait_ready().await.unwrap();

    let listing = api.waiting_files().await.unwrap();
    let names: Vec<&str> = listing
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["name"].as_str())
        .collect();
    assert!(names.contains(&"report.txt"));

    let contents = api.get_waiting_file("report.txt").await.unwrap();
    assert_eq!(&contents[..], b"hello from a peer");

    api.delete_waiting_file("report.txt").await.unwrap();
    let err = api.get_waiting_file("report.txt").await.unwrap_err();
    assert!(matches!(err, LocalApiError::Daemon { status: 404, .. }));
}

#[tokio::test]
async fn push_file_stores_raw_bytes() {
    let daemon = MockDaemon::new();
    let (_dir, _handle, api) = start(&daemon);
    api.wait_ready().await.unwrap();

    api.push_file("node-peer-1", "upload.bin", Bytes::from_static(&[0, 159, 146, 150]))
        .await
        .unwrap();
    assert_eq!(
        daemon.file_contents("upload.bin"),
        Some(vec![0, 159, 146, 150])
    );
}

#[tokio::test]
async fn metrics_are_plain_text() {
    let daemon = MockDaemon::new();
    let (_dir, _handle, api) = start(&daemon);
    api.wait_ready().await.unwrap();

    let metrics = api.metrics().await.unwrap();
    assert!(metrics.contains("mock_requests_total"));

    let dump = api.goroutines().await.unwrap();
    assert!(dump.contains("goroutine"));
}

#[tokio::test]
async fn counter_uploads_and_negative_delta() {
    let daemon = MockDaemon::new();
    let (_dir, _handle, api) = start(&daemon);
    api.wait_ready().await.unwrap();

    api.increment_counter("requests_total", 3).await.unwrap();
    let uploads = daemon.metric_uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(
        uploads[0],
        json!([{"name": "requests_total", "type": "counter", "value": 3}])
    );

    let err = api.increment_counter("requests_total", -1).await.unwrap_err();
    assert!(matches!(err, LocalApiError::NegativeMetricDelta(-1)));
    // The rejected increment never reached the daemon.
    assert_eq!(daemon.metric_uploads().len(), 1);
}

#[tokio::test]
async fn login_logout_succeed() {
    let daemon = MockDaemon::new();
    let (_dir, _handle, api) = start(&daemon);
    api.wait_ready().await.unwrap();

    api.login_interactive().await.unwrap();
    api.logout().await.unwrap();
}

/// A daemon stand-in that answers every request with a chunked body and no
/// content length, which real `tailscaled` never does for file fetches.
fn spawn_chunked_responder(socket: &std::path::Path) -> tokio::task::JoinHandle<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::UnixListener::bind(socket).unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream
                    .write_all(
                        b"HTTP/1.1 200 OK\r\n\
                          Transfer-Encoding: chunked\r\n\
                          Connection: close\r\n\
                          \r\n\
                          5\r\nhello\r\n0\r\n\r\n",
                    )
                    .await;
            });
        }
    })
}

#[tokio::test]
async fn chunked_file_fetch_is_rejected() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("chunky.sock");
    let _responder = spawn_chunked_responder(&socket);

    let api = LocalApi::builder()
        .platform(Platform::Unix)
        .socket_path(&socket)
        .probe_policy(fast_probe())
        .connect()
        .unwrap();
    api.wait_ready().await.unwrap();

    let err = api.get_waiting_file("report.txt").await.unwrap_err();
    assert!(matches!(err, LocalApiError::UnexpectedChunkedBody));
}

#[tokio::test]
async fn probe_exhaustion_is_terminal() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let api = LocalApi::builder()
        .platform(Platform::Unix)
        .socket_path(dir.path().join("nobody-home.sock"))
        .probe_policy(ProbePolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(5),
        })
        .connect()
        .unwrap();

    let err = api.wait_ready().await.unwrap_err();
    assert!(matches!(
        err,
        LocalApiError::ProbeExhausted { attempts: 2 }
    ));
    assert_eq!(api.probe_state(), ProbeState::Failed);

    // Individual calls still fail locally without re-probing.
    let err = api.status().await.unwrap_err();
    assert!(matches!(err, LocalApiError::Connect { .. }));
}

#[tokio::test]
async fn calls_before_ready_fail_locally() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("late.sock");

    // No daemon yet: the constructor returns immediately and a direct call
    // fails with a connect error while the probe keeps retrying.
    let api = LocalApi::builder()
        .platform(Platform::Unix)
        .socket_path(&socket)
        .probe_policy(ProbePolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(25),
        })
        .connect()
        .unwrap();
    let err = api.status().await.unwrap_err();
    assert!(matches!(err, LocalApiError::Connect { .. }));

    // Daemon shows up before the budget runs out.
    let daemon = MockDaemon::new();
    let _handle = daemon.spawn(&socket).unwrap();
    api.wait_ready().await.unwrap();
    assert_eq!(api.status().await.unwrap()["backendState"], "Running");
}
