//! The `LocalAPI` client and its per-endpoint wrappers.
//!
//! Every endpoint is one request through the transport; JSON bodies come back
//! with all keys rewritten to camelCase, text endpoints (metrics, goroutine
//! dumps) come back verbatim, and file transfers move raw bytes.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use hyper::Method;
use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::casing::normalize_keys;
use crate::error::{LocalApiError, LocalApiResult};
use crate::platform::Platform;
use crate::transport::{ProbePolicy, ProbeState, Transport, spawn_probe};

/// Client for the `tailscaled` `LocalAPI`.
///
/// Construction resolves the transport (possibly running credential
/// discovery, which can fail) and spawns a background probe; it does not wait
/// for the daemon. A call issued before the probe succeeds may fail with a
/// connect error — use [`LocalApi::wait_ready`] to block until the daemon
/// answers or the retry budget runs out.
pub struct LocalApi {
    transport: Arc<Transport>,
    probe_state: watch::Receiver<ProbeState>,
    probe_task: JoinHandle<()>,
    attempts: u32,
}

/// Builder for [`LocalApi`].
#[derive(Debug, Default)]
pub struct LocalApiBuilder {
    socket_path: Option<PathBuf>,
    socket_only: bool,
    platform: Option<Platform>,
    credentials_dir: Option<PathBuf>,
    probe: Option<ProbePolicy>,
}

impl LocalApiBuilder {
    /// Override the daemon socket path.
    #[must_use]
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// Force the Unix socket even on macOS.
    #[must_use]
    pub fn socket_only(mut self, socket_only: bool) -> Self {
        self.socket_only = socket_only;
        self
    }

    /// Skip platform detection and behave as the given platform.
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Look for `sameuserproof` files somewhere other than `/Library/Tailscale`.
    #[must_use]
    pub fn credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = Some(dir.into());
        self
    }

    /// Replace the default startup-probe retry budget.
    #[must_use]
    pub fn probe_policy(mut self, policy: ProbePolicy) -> Self {
        self.probe = Some(policy);
        self
    }

    /// Resolve the transport and start probing.
    ///
    /// Returns immediately; probing continues in the background. Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails on credential discovery problems (macOS TCP mode) or an
    /// undialable platform transport.
    pub fn connect(self) -> LocalApiResult<LocalApi> {
        let platform = self.platform.unwrap_or_else(Platform::detect);
        let transport = Arc::new(Transport::resolve(
            platform,
            self.socket_path,
            self.socket_only,
            self.credentials_dir.as_deref(),
        )?);
        let policy = self.probe.unwrap_or_default();
        let attempts = policy.max_retries + 1;
        let (probe_state, probe_task) = spawn_probe(Arc::clone(&transport), policy);
        Ok(LocalApi {
            transport,
            probe_state,
            probe_task,
            attempts,
        })
    }
}

impl LocalApi {
    /// Start building a client.
    #[must_use]
    pub fn builder() -> LocalApiBuilder {
        LocalApiBuilder::default()
    }

    /// Wait until the startup probe reaches a verdict.
    ///
    /// # Errors
    ///
    /// [`LocalApiError::ProbeExhausted`] if the daemon never answered within
    /// the retry budget.
    pub async fn wait_ready(&self) -> LocalApiResult<()> {
        let mut rx = self.probe_state.clone();
        loop {
            match *rx.borrow_and_update() {
                ProbeState::Ready => return Ok(()),
                ProbeState::Failed => {
                    return Err(LocalApiError::ProbeExhausted {
                        attempts: self.attempts,
                    });
                }
                ProbeState::Probing => {}
            }
            if rx.changed().await.is_err() {
                return Err(LocalApiError::ProbeExhausted {
                    attempts: self.attempts,
                });
            }
        }
    }

    /// Current probe verdict without waiting.
    #[must_use]
    pub fn probe_state(&self) -> ProbeState {
        *self.probe_state.borrow()
    }

    /// Classify an address against the tailnet ranges.
    #[must_use]
    pub fn tailnet_addr(&self, addr: &str) -> Option<IpAddr> {
        crate::tailnet::tailnet_addr(addr)
    }

    // ── JSON endpoints ──────────────────────────────────────────────────

    /// Current daemon status, keys normalized to camelCase.
    pub async fn status(&self) -> LocalApiResult<Value> {
        self.get_json("/localapi/v0/status").await
    }

    /// Look up the tailnet peer owning an address.
    pub async fn whois(&self, addr: IpAddr) -> LocalApiResult<Value> {
        self.get_json(&format!("/localapi/v0/whois?addr={addr}"))
            .await
    }

    /// List files peers have sent us that are waiting to be picked up.
    pub async fn waiting_files(&self) -> LocalApiResult<Value> {
        self.get_json("/localapi/v0/files/").await
    }

    // ── Text endpoints ──────────────────────────────────────────────────

    /// Daemon metrics in Prometheus text format.
    pub async fn metrics(&self) -> LocalApiResult<String> {
        self.get_text("/localapi/v0/metrics").await
    }

    /// Goroutine dump from the daemon, for debugging.
    pub async fn goroutines(&self) -> LocalApiResult<String> {
        self.get_text("/localapi/v0/goroutines").await
    }

    // ── File transfer ───────────────────────────────────────────────────

    /// Fetch a waiting file's contents.
    ///
    /// # Errors
    ///
    /// [`LocalApiError::UnexpectedChunkedBody`] if the daemon streams the
    /// file chunked without announcing a content length.
    pub async fn get_waiting_file(&self, name: &str) -> LocalApiResult<Bytes> {
        let resp = self
            .transport
            .request(Method::GET, &file_path("/localapi/v0/files/", name))
            .await?;
        let chunked = resp
            .headers
            .get(TRANSFER_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("chunked"));
        if chunked && !resp.headers.contains_key(CONTENT_LENGTH) {
            return Err(LocalApiError::UnexpectedChunkedBody);
        }
        Ok(resp.body)
    }

    /// Delete a waiting file.
    pub async fn delete_waiting_file(&self, name: &str) -> LocalApiResult<()> {
        self.transport
            .request(Method::DELETE, &file_path("/localapi/v0/files/", name))
            .await?;
        Ok(())
    }

    /// Send a file to a peer via Taildrop.
    pub async fn push_file(
        &self,
        peer_stable_id: &str,
        name: &str,
        data: Bytes,
    ) -> LocalApiResult<()> {
        let path = format!(
            "/localapi/v0/file-put/{}/{}",
            utf8_percent_encode(peer_stable_id, NON_ALPHANUMERIC),
            utf8_percent_encode(name, NON_ALPHANUMERIC),
        );
        self.transport
            .request_with_body(Method::PUT, &path, data, "application/octet-stream")
            .await?;
        Ok(())
    }

    // ── Session & metrics upload ────────────────────────────────────────

    /// Kick off an interactive login flow in the daemon.
    pub async fn login_interactive(&self) -> LocalApiResult<()> {
        self.transport
            .request(Method::POST, "/localapi/v0/login-interactive")
            .await?;
        Ok(())
    }

    /// Log the node out of the tailnet.
    pub async fn logout(&self) -> LocalApiResult<()> {
        self.transport
            .request(Method::POST, "/localapi/v0/logout")
            .await?;
        Ok(())
    }

    /// Increment a client metric counter by `delta`.
    ///
    /// # Errors
    ///
    /// [`LocalApiError::NegativeMetricDelta`] before any request is made if
    /// `delta` is negative.
    pub async fn increment_counter(&self, name: &str, delta: i64) -> LocalApiResult<()> {
        if delta < 0 {
            return Err(LocalApiError::NegativeMetricDelta(delta));
        }
        let body = serde_json::json!([{
            "name": name,
            "type": "counter",
            "value": delta,
        }]);
        self.transport
            .request_with_body(
                Method::POST,
                "/localapi/v0/upload-client-metrics",
                Bytes::from(body.to_string()),
                "application/json",
            )
            .await?;
        Ok(())
    }

    // ── Shared plumbing ─────────────────────────────────────────────────

    async fn get_json(&self, path: &str) -> LocalApiResult<Value> {
        let resp = self.transport.request(Method::GET, path).await?;
        let value: Value = serde_json::from_slice(&resp.body)
            .map_err(|e| LocalApiError::Parse(format!("{path}: {e}")))?;
        Ok(normalize_keys(&value))
    }

    async fn get_text(&self, path: &str) -> LocalApiResult<String> {
        let resp = self.transport.request(Method::GET, path).await?;
        String::from_utf8(resp.body.to_vec())
            .map_err(|e| LocalApiError::Parse(format!("{path}: {e}")))
    }
}

impl Drop for LocalApi {
    fn drop(&mut self) {
        // The probe has no business outliving its client.
        self.probe_task.abort();
    }
}

fn file_path(prefix: &str, name: &str) -> String {
    format!("{prefix}{}", utf8_percent_encode(name, NON_ALPHANUMERIC))
}
