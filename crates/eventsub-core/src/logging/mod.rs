//! Structured logging with `tracing`.
//!
//! This module provides:
//! - [`init_subscriber`] for installing the process-wide `tracing` subscriber
//! - `capture_logs` for asserting on emitted events in tests (`test-utils` feature)
//!
//! Components log through the `tracing` macros with structured fields
//! (`url`, `attempt`, `session_id`, ...). The subscriber decides format
//! and filtering; `RUST_LOG` takes precedence over the configured level.

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
///
/// # Arguments
///
/// * `level` - Minimum log level to display when `RUST_LOG` is unset.
/// * `json` - Emit one JSON object per line instead of compact text.
pub fn init_subscriber(level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init fails if a global subscriber is already set
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}
