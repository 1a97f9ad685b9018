//! # UA Telemetry
//!
//! Tracing bootstrap for the UA-HTTPS transport and the binaries built on it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ua_telemetry::{init_tracing, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_tracing(&config).expect("Failed to init tracing");
//!
//!     // Transport lifecycle events are now emitted
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `ua-https-client` | Service name attached to the startup event |
//! | `UA_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `UA_CONSOLE_OUTPUT` | `true` | Emit events to stdout |
//! | `UA_JSON_LOGS` | `false` | JSON formatted output |

#![warn(clippy::all)]
#![deny(unsafe_code)]

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{init_tracing, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Install tracing for tests, ignoring the error when another test already did.
///
/// Output goes through the test writer so it is captured per test.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
