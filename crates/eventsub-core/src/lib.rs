//! # eventsub-core
//!
//! Shared vocabulary for the EventSub workspace:
//!
//! - **Constants**: package name, version, default endpoint
//! - **Retry**: [`retry::ReconnectPolicy`] and the capped exponential backoff law
//! - **Logging**: `tracing` subscriber bootstrap and in-memory log capture for tests

#![deny(unsafe_code)]

pub mod constants;
pub mod logging;
pub mod retry;

pub use retry::{ReconnectPolicy, calculate_backoff_delay};
