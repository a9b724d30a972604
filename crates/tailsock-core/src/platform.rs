//! Host platform and container detection.
//!
//! The transport strategy depends on where we run: macOS prefers the
//! authenticated loopback TCP port, containers mount the daemon socket at a
//! fixed path under `/tmp`, and everything else uses the platform-default
//! Unix socket.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Default Unix socket path for `tailscaled` on macOS and other Unixes.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/tailscale/tailscaled.sock";

/// Socket path used when running inside a container.
pub const CONTAINER_SOCKET_PATH: &str = "/tmp/tailscaled.sock";

/// Named pipe `tailscaled` listens on under Windows.
pub const WINDOWS_PIPE_PATH: &str = r"\\.\pipe\ProtectedPrefix\Administrators\Tailscale\tailscaled";

/// Runtime platform, as far as transport selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Unix,
    Container,
}

impl Platform {
    /// Detect the current platform, preferring the container classification
    /// over the compile-target OS when container markers are present.
    #[must_use]
    pub fn detect() -> Self {
        if in_container() {
            debug!("container environment detected");
            return Self::Container;
        }
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Unix
        }
    }

    /// Default daemon endpoint path for this platform.
    #[must_use]
    pub fn default_socket_path(self) -> PathBuf {
        match self {
            Self::Container => PathBuf::from(CONTAINER_SOCKET_PATH),
            Self::Windows => PathBuf::from(WINDOWS_PIPE_PATH),
            Self::MacOs | Self::Unix => PathBuf::from(DEFAULT_SOCKET_PATH),
        }
    }
}

/// Container markers: a `/.dockerenv` file, a Kubernetes service env var, or
/// container runtime names in PID 1's cgroup.
fn in_container() -> bool {
    if Path::new("/.dockerenv").exists() {
        return true;
    }
    if std::env::var_os("KUBERNETES_SERVICE_HOST").is_some() {
        return true;
    }
    if cfg!(target_os = "linux")
        && let Ok(cgroup) = std::fs::read_to_string("/proc/1/cgroup")
    {
        return cgroup_names_container(&cgroup);
    }
    false
}

/// Pure predicate over `/proc/1/cgroup` contents.
fn cgroup_names_container(contents: &str) -> bool {
    ["docker", "kubepods", "lxc"]
        .iter()
        .any(|marker| contents.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cgroup_markers() {
        assert!(cgroup_names_container(
            "12:pids:/docker/3f8a\n11:memory:/docker/3f8a\n"
        ));
        assert!(cgroup_names_container(
            "1:name=systemd:/kubepods/besteffort/pod1234\n"
        ));
        assert!(cgroup_names_container("5:cpuset:/lxc/mycontainer\n"));
        assert!(!cgroup_names_container("0::/init.scope\n"));
        assert!(!cgroup_names_container(""));
    }

    #[test]
    fn socket_paths_per_platform() {
        assert_eq!(
            Platform::Container.default_socket_path(),
            PathBuf::from("/tmp/tailscaled.sock")
        );
        assert_eq!(
            Platform::Unix.default_socket_path(),
            PathBuf::from("/var/run/tailscale/tailscaled.sock")
        );
        assert_eq!(
            Platform::MacOs.default_socket_path(),
            PathBuf::from(DEFAULT_SOCKET_PATH)
        );
        assert!(
            Platform::Windows
                .default_socket_path()
                .to_string_lossy()
                .contains("pipe")
        );
    }
}
