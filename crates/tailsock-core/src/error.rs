//! Error taxonomy for the `LocalAPI` client.
//!
//! Discovery errors are fatal at construction. Connection errors during the
//! startup probe are retried with backoff and surface as [`ProbeExhausted`]
//! once the retry budget is spent. Request errors stay local to the call that
//! hit them and are never retried automatically.
//!
//! [`ProbeExhausted`]: LocalApiError::ProbeExhausted

use std::path::PathBuf;

/// Result alias for `LocalAPI` operations.
pub type LocalApiResult<T> = Result<T, LocalApiError>;

/// Errors from client construction and `LocalAPI` requests.
#[derive(Debug, thiserror::Error)]
pub enum LocalApiError {
    /// Credential files missing, unreadable, or malformed (macOS TCP mode).
    #[error("credential discovery failed: {0}")]
    Discovery(String),

    /// Could not reach the daemon's socket or loopback port.
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// The transport refused or dropped an individual request.
    #[error("request failed: {0}")]
    Request(String),

    /// The daemon answered with a non-success status; the body text rides
    /// along as context.
    #[error("daemon returned {status}: {body}")]
    Daemon { status: u16, body: String },

    /// The response body was not the JSON we expected.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Client metric increments must be non-negative.
    #[error("metric increment must be non-negative, got {0}")]
    NegativeMetricDelta(i64),

    /// A file fetch arrived chunked with no content length.
    #[error("file response used chunked transfer encoding without a content length")]
    UnexpectedChunkedBody,

    /// The startup probe exhausted its retry budget; the daemon never
    /// answered. Terminal for this client instance.
    #[error("daemon did not become reachable after {attempts} attempts")]
    ProbeExhausted { attempts: u32 },

    /// The resolved transport cannot be dialed on this platform.
    #[error("cannot dial {} on this platform", path.display())]
    UnsupportedTransport { path: PathBuf },
}
