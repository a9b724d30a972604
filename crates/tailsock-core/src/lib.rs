#![deny(unsafe_code)]

//! Tailscale `LocalAPI` client core.
//!
//! Talks to a locally running `tailscaled` over whichever machine-local
//! transport the host offers: a Unix domain socket on most platforms, or an
//! authenticated loopback TCP port on macOS (discovered through the
//! `sameuserproof` file pair). The daemon's JSON responses use mixed
//! `PascalCase`/`snake_case` keys; every JSON body is rewritten to a single
//! camelCase convention before it reaches the caller.
//!
//! ```no_run
//! use tailsock_core::LocalApi;
//!
//! # async fn demo() -> tailsock_core::LocalApiResult<()> {
//! let api = LocalApi::builder().connect()?;
//! api.wait_ready().await?;
//! let status = api.status().await?;
//! println!("{}", status["backendState"]);
//! # Ok(())
//! # }
//! ```

/// Per-endpoint request wrappers over the transport.
pub mod api;
/// Identifier tokenization and recursive camelCase key rewriting.
pub mod casing;
/// macOS `sameuserproof` credential discovery.
pub mod credentials;
/// Error taxonomy for client construction and requests.
pub mod error;
/// Host platform and container detection.
pub mod platform;
/// Tailnet address-range membership.
pub mod tailnet;
/// Socket/TCP dispatch and the startup probe.
pub mod transport;

pub use api::{LocalApi, LocalApiBuilder};
pub use casing::{normalize_keys, to_camel_case, tokenize};
pub use credentials::SameUserProof;
pub use error::{LocalApiError, LocalApiResult};
pub use platform::Platform;
pub use tailnet::{is_tailnet_ip, tailnet_addr};
pub use transport::{ProbePolicy, ProbeState, Transport};

/// Virtual `Host` header value naming the logical socket endpoint.
pub const LOCALAPI_HOST: &str = "local-tailscaled.sock";
