//! Daemon transport — Unix-socket or authenticated loopback-TCP dispatch,
//! plus the startup probe.
//!
//! The transport is resolved once at client construction and never changes: a
//! Unix domain socket everywhere except macOS, where (unless socket-only mode
//! is forced) the `sameuserproof` credentials select a loopback TCP port with
//! HTTP Basic auth. Each request opens its own HTTP/1.1 connection; there is
//! no pooling and no per-request timeout beyond the transport's own errors.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, HOST, HeaderMap};
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::LOCALAPI_HOST;
use crate::credentials::SameUserProof;
use crate::error::{LocalApiError, LocalApiResult};
use crate::platform::Platform;

/// A collected daemon response: status line, headers, and full body.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Resolved dispatch target. Built once, immutable thereafter.
#[derive(Debug, Clone)]
pub enum Transport {
    /// Unix domain socket (the default everywhere but macOS).
    Unix { socket_path: PathBuf },
    /// Loopback TCP with Basic auth (macOS GUI builds).
    Tcp { port: u16, auth_header: String },
}

impl Transport {
    /// Pick the transport for a platform.
    ///
    /// macOS without forced socket-only mode runs credential discovery; a
    /// discovery failure aborts construction rather than falling back to the
    /// socket. Everything else dials the override path if given, otherwise
    /// the platform default.
    pub fn resolve(
        platform: Platform,
        socket_path: Option<PathBuf>,
        socket_only: bool,
        credentials_dir: Option<&Path>,
    ) -> LocalApiResult<Self> {
        if platform == Platform::MacOs && !socket_only {
            let proof = match credentials_dir {
                Some(dir) => SameUserProof::discover_in(dir)?,
                None => SameUserProof::discover()?,
            };
            return Ok(Self::Tcp {
                port: proof.port,
                auth_header: basic_auth(&proof.token),
            });
        }

        let path = socket_path.unwrap_or_else(|| platform.default_socket_path());
        if platform == Platform::Windows {
            // The Windows named pipe is not dialable from here.
            return Err(LocalApiError::UnsupportedTransport { path });
        }
        Ok(Self::Unix { socket_path: path })
    }

    /// Human-readable endpoint, for logs and errors.
    #[must_use]
    pub fn endpoint(&self) -> String {
        match self {
            Self::Unix { socket_path } => socket_path.display().to_string(),
            Self::Tcp { port, .. } => format!("127.0.0.1:{port}"),
        }
    }

    /// Send a bodyless request.
    pub async fn request(&self, method: Method, path: &str) -> LocalApiResult<RawResponse> {
        self.send(method, path, Bytes::new(), None).await
    }

    /// Send a request with a body and explicit content type.
    pub async fn request_with_body(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        content_type: &'static str,
    ) -> LocalApiResult<RawResponse> {
        self.send(method, path, body, Some(content_type)).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        content_type: Option<&'static str>,
    ) -> LocalApiResult<RawResponse> {
        debug!(%method, path, endpoint = %self.endpoint(), "localapi request");

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, LOCALAPI_HOST);
        if let Self::Tcp { auth_header, .. } = self {
            builder = builder.header(AUTHORIZATION, auth_header.as_str());
        }
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let req = builder
            .body(Full::new(body))
            .map_err(|e| LocalApiError::Request(format!("failed to build request: {e}")))?;

        let resp = match self {
            Self::Unix { socket_path } => {
                let stream =
                    UnixStream::connect(socket_path)
                        .await
                        .map_err(|e| LocalApiError::Connect {
                            endpoint: socket_path.display().to_string(),
                            source: e,
                        })?;
                send_over(TokioIo::new(stream), req).await?
            }
            Self::Tcp { port, .. } => {
                let stream = TcpStream::connect(("127.0.0.1", *port)).await.map_err(|e| {
                    LocalApiError::Connect {
                        endpoint: format!("127.0.0.1:{port}"),
                        source: e,
                    }
                })?;
                send_over(TokioIo::new(stream), req).await?
            }
        };

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = BodyExt::collect(resp.into_body())
            .await
            .map_err(|e| LocalApiError::Request(format!("failed to read response body: {e}")))?
            .to_bytes();

        if !status.is_success() {
            return Err(LocalApiError::Daemon {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Run one HTTP/1.1 exchange over a freshly connected stream, driving the
/// connection in the background.
async fn send_over<I>(
    io: I,
    req: hyper::Request<Full<Bytes>>,
) -> LocalApiResult<hyper::Response<hyper::body::Incoming>>
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| LocalApiError::Request(format!("HTTP handshake failed: {e}")))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "localapi connection error");
        }
    });

    sender
        .send_request(req)
        .await
        .map_err(|e| LocalApiError::Request(format!("request failed: {e}")))
}

/// Basic-auth header value for an empty username and the proof token.
fn basic_auth(token: &str) -> String {
    format!("Basic {}", BASE64_STANDARD.encode(format!(":{token}")))
}

// ── Startup probe ───────────────────────────────────────────────────────

/// Retry budget for the startup probe.
#[derive(Debug, Clone)]
pub struct ProbePolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// First retry delay; later delays grow by ×1.5 per retry.
    pub base_delay: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(5000),
        }
    }
}

impl ProbePolicy {
    /// Delay before the given retry: `base × 1.5^retry`, uncapped within the
    /// retry budget.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay.mul_f64(1.5f64.powi(retry as i32))
    }
}

/// Where the startup probe currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    /// Still trying to reach the daemon.
    Probing,
    /// A probe got a success response; the client is usable.
    Ready,
    /// Retry budget exhausted. Terminal for this client.
    Failed,
}

/// Spawn the background startup probe against `/localapi/v0/status`.
///
/// The caller gets a watch channel carrying [`ProbeState`] and the task's
/// join handle for cancellation. The probe never re-runs after `Ready`.
pub(crate) fn spawn_probe(
    transport: Arc<Transport>,
    policy: ProbePolicy,
) -> (watch::Receiver<ProbeState>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(ProbeState::Probing);

    let handle = tokio::spawn(async move {
        let mut retry = 0u32;
        loop {
            match transport.request(Method::GET, "/localapi/v0/status").await {
                Ok(_) => {
                    info!(endpoint = %transport.endpoint(), "connected to tailscaled");
                    let _ = tx.send(ProbeState::Ready);
                    return;
                }
                Err(err) if retry < policy.max_retries => {
                    let delay = policy.delay(retry);
                    warn!(
                        error = %err,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "tailscaled not reachable yet, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(err) => {
                    error!(
                        error = %err,
                        attempts = retry + 1,
                        "giving up on tailscaled"
                    );
                    let _ = tx.send(ProbeState::Failed);
                    return;
                }
            }
        }
    });

    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn backoff_schedule_is_exact() {
        let policy = ProbePolicy::default();
        let expected_ms = [5000.0, 7500.0, 11250.0, 16875.0, 25312.5];
        for (retry, ms) in expected_ms.iter().enumerate() {
            assert_eq!(
                policy.delay(retry as u32),
                Duration::from_secs_f64(ms / 1000.0)
            );
        }
        assert_eq!(policy.delay(4), Duration::from_micros(25_312_500));
    }

    #[test]
    fn basic_auth_empty_username() {
        // ":deadbeef" → base64
        assert_eq!(basic_auth("deadbeef"), "Basic OmRlYWRiZWVm");
    }

    #[test]
    fn resolve_unix_prefers_override() {
        let t = Transport::resolve(
            Platform::Unix,
            Some(PathBuf::from("/run/custom.sock")),
            false,
            None,
        )
        .unwrap();
        match t {
            Transport::Unix { socket_path } => {
                assert_eq!(socket_path, PathBuf::from("/run/custom.sock"));
            }
            Transport::Tcp { .. } => panic!("expected unix transport"),
        }
    }

    #[test]
    fn resolve_container_default() {
        let t = Transport::resolve(Platform::Container, None, false, None).unwrap();
        assert_eq!(t.endpoint(), "/tmp/tailscaled.sock");
    }

    #[test]
    fn resolve_macos_socket_only_skips_discovery() {
        let t = Transport::resolve(Platform::MacOs, None, true, None).unwrap();
        assert_eq!(t.endpoint(), "/var/run/tailscale/tailscaled.sock");
    }

    #[test]
    fn resolve_macos_discovery_failure_aborts() {
        let empty = tempfile::tempdir().unwrap();
        let err =
            Transport::resolve(Platform::MacOs, None, false, Some(empty.path())).unwrap_err();
        assert!(matches!(err, LocalApiError::Discovery(_)));
    }

    #[test]
    fn resolve_macos_tcp_from_proof() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("40800", dir.path().join("ipnport")).unwrap();
        std::fs::write(dir.path().join("sameuserproof-40800"), "tok\n").unwrap();

        let t = Transport::resolve(Platform::MacOs, None, false, Some(dir.path())).unwrap();
        match t {
            Transport::Tcp { port, auth_header } => {
                assert_eq!(port, 40800);
                assert!(auth_header.starts_with("Basic "));
            }
            Transport::Unix { .. } => panic!("expected tcp transport"),
        }
    }

    #[test]
    fn resolve_windows_is_unsupported() {
        let err = Transport::resolve(Platform::Windows, None, true, None).unwrap_err();
        assert!(matches!(err, LocalApiError::UnsupportedTransport { .. }));
    }
}
