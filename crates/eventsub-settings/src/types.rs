//! Settings types.
//!
//! All structs use camelCase JSON and default every field, so a partial
//! settings file only needs to name what it overrides.

use eventsub_core::constants::{DEFAULT_EVENT_BUFFER, DEFAULT_EVENTSUB_URL};
use eventsub_core::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS, ReconnectPolicy};
use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSubSettings {
    /// Streaming client settings.
    pub client: ClientSettings,
    /// Logging output settings.
    pub logging: LoggingSettings,
}

/// Streaming client settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Initial endpoint. The server may redirect away from it at runtime.
    pub url: String,
    /// Backoff between reconnect attempts.
    pub reconnect: ReconnectSettings,
    /// Capacity of the client event broadcast channel.
    pub event_buffer: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_EVENTSUB_URL.to_string(),
            reconnect: ReconnectSettings::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Reconnect backoff settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on the delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl ReconnectSettings {
    /// Convert into the runtime policy.
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.base_delay_ms, self.max_delay_ms)
    }
}

/// Logging output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
