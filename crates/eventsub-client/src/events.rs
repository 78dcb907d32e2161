//! Events broadcast by the client to the rest of the application.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::envelope::SessionInfo;

/// Reaction to a handled subscription notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// A broadcaster started streaming.
    StreamOnline(StreamOnline),
    /// A broadcaster stopped streaming.
    StreamOffline(StreamOffline),
}

/// `stream.online` event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOnline {
    /// Broadcaster user id.
    pub broadcaster_user_id: String,
    /// Broadcaster login name.
    pub broadcaster_user_login: Option<String>,
    /// Broadcaster display name.
    pub broadcaster_user_name: Option<String>,
    /// Stream type (`live`, `playlist`, ...).
    #[serde(rename = "type")]
    pub stream_type: Option<String>,
    /// Stream start time.
    pub started_at: Option<String>,
}

/// `stream.offline` event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOffline {
    /// Broadcaster user id.
    pub broadcaster_user_id: String,
    /// Broadcaster login name.
    pub broadcaster_user_login: Option<String>,
    /// Broadcaster display name.
    pub broadcaster_user_name: Option<String>,
}

/// Lifecycle and data events emitted by [`EventStreamClient`](crate::EventStreamClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// A socket was opened.
    Connected {
        /// Endpoint the socket is connected to.
        url: String,
    },
    /// The server announced the session.
    SessionWelcome(SessionInfo),
    /// A handled subscription notification arrived.
    Notification(Notification),
    /// The server asked us to move to another endpoint.
    Redirected {
        /// New target endpoint.
        url: String,
    },
    /// A reconnect attempt is scheduled after `delay`.
    Reconnecting {
        /// Attempt number since the last successful connection (1-based).
        attempt: u32,
        /// Backoff before the attempt.
        delay: Duration,
    },
    /// The current socket was torn down.
    Disconnected,
}
