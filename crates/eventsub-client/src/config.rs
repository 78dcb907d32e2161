//! Client configuration.

use eventsub_core::constants::{DEFAULT_EVENT_BUFFER, DEFAULT_EVENTSUB_URL};
use eventsub_core::retry::ReconnectPolicy;
use eventsub_settings::ClientSettings;
use url::Url;

use crate::errors::{EventSubError, Result};

/// Configuration for [`EventStreamClient`](crate::EventStreamClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Initial endpoint (default: Twitch EventSub).
    pub url: String,
    /// Backoff between reconnect attempts.
    pub reconnect: ReconnectPolicy,
    /// Capacity of the client event broadcast channel.
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_EVENTSUB_URL.into(),
            reconnect: ReconnectPolicy::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Replace the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Build from the `client` section of loaded settings.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            url: settings.url.clone(),
            reconnect: settings.reconnect.policy(),
            event_buffer: settings.event_buffer,
        }
    }
}

/// Parse and check a WebSocket endpoint.
pub fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|source| EventSubError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(EventSubError::UnsupportedScheme(other.to_string())),
    }
}
