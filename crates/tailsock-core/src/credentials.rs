//! macOS `sameuserproof` credential discovery.
//!
//! The GUI build of Tailscale on macOS does not expose a Unix socket.
//! Instead, the daemon drops a symlink `/Library/Tailscale/ipnport` whose
//! link *target text* is the loopback TCP port it listens on, and a sibling
//! file `sameuserproof-<port>` whose trimmed contents are the auth token.
//! Being able to read that file proves we run as the logged-in user; the
//! token is sent as HTTP Basic auth with an empty username.

use std::path::Path;

use tracing::debug;

use crate::error::{LocalApiError, LocalApiResult};

/// Directory holding the port symlink and token file.
pub const CREDENTIALS_DIR: &str = "/Library/Tailscale";

/// Name of the symlink whose target encodes the port.
pub const PORT_LINK_NAME: &str = "ipnport";

/// Loopback TCP credentials recovered from the proof file pair.
#[derive(Debug, Clone)]
pub struct SameUserProof {
    /// Port `tailscaled` listens on at `127.0.0.1`.
    pub port: u16,
    /// Token sent as the Basic-auth password.
    pub token: String,
}

impl SameUserProof {
    /// Discover credentials in the fixed system directory.
    ///
    /// # Errors
    ///
    /// Returns [`LocalApiError::Discovery`] if either file is missing,
    /// unreadable, or malformed. Construction does not recover from this.
    pub fn discover() -> LocalApiResult<Self> {
        Self::discover_in(Path::new(CREDENTIALS_DIR))
    }

    /// Discover credentials in an arbitrary directory.
    pub fn discover_in(dir: &Path) -> LocalApiResult<Self> {
        let link = dir.join(PORT_LINK_NAME);
        let target = std::fs::read_link(&link).map_err(|e| {
            LocalApiError::Discovery(format!("reading port link {}: {e}", link.display()))
        })?;
        let port_text = target.to_str().ok_or_else(|| {
            LocalApiError::Discovery(format!(
                "port link {} target is not valid UTF-8",
                link.display()
            ))
        })?;
        let port: u16 = port_text.trim().parse().map_err(|_| {
            LocalApiError::Discovery(format!(
                "port link {} target {port_text:?} is not a port number",
                link.display()
            ))
        })?;

        // The token file is named with the literal link target text.
        let token_path = dir.join(format!("sameuserproof-{port_text}"));
        let token = std::fs::read_to_string(&token_path)
            .map_err(|e| {
                LocalApiError::Discovery(format!(
                    "reading token file {}: {e}",
                    token_path.display()
                ))
            })?
            .trim()
            .to_string();
        if token.is_empty() {
            return Err(LocalApiError::Discovery(format!(
                "token file {} is empty",
                token_path.display()
            )));
        }

        debug!(port, "discovered sameuserproof credentials");
        Ok(Self { port, token })
    }
}
