#![deny(unsafe_code)]

//! Shared test utilities for the tailsock workspace.
//!
//! Provides a mock `LocalAPI` daemon served over a Unix socket and tracing
//! helpers so that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! tailsock-test-utils = { workspace = true }
//! ```

pub mod daemon;
pub mod tracing_setup;

pub use daemon::MockDaemon;
