//! Inbound envelope decoding.
//!
//! Every frame from the server is a JSON document with a `metadata` section
//! (carrying the `message_type` discriminator) and a `payload` section whose
//! shape depends on that type. [`decode_envelope`] turns the raw text into a
//! typed [`InboundEnvelope`]; it fails only for frames the client cannot act
//! on, which the receive loop drops.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::parse_endpoint;
use crate::errors::{EventSubError, Result};

/// Envelope metadata shared by every message type.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Metadata {
    /// Server-assigned message id.
    pub message_id: Option<String>,
    /// Discriminator (`session_welcome`, `notification`, ...).
    pub message_type: String,
    /// RFC 3339 send time.
    pub message_timestamp: Option<String>,
    /// Subscription type, present on notification and revocation messages.
    pub subscription_type: Option<String>,
    /// Subscription version, present on notification and revocation messages.
    pub subscription_version: Option<String>,
}

/// Session identity announced by the welcome frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier.
    pub id: String,
    /// Session status (`connected`, `reconnecting`, ...).
    pub status: Option<String>,
    /// Seconds of silence after which the server considers us gone.
    pub keepalive_timeout_seconds: Option<u64>,
    /// Connection time reported by the server.
    pub connected_at: Option<String>,
}

/// Subscription type tag of a notification.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SubscriptionType {
    /// `stream.online`
    StreamOnline,
    /// `stream.offline`
    StreamOffline,
    /// Any tag the client has no reaction for.
    Other(String),
}

impl SubscriptionType {
    /// Wire name of the tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::StreamOnline => "stream.online",
            Self::StreamOffline => "stream.offline",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for SubscriptionType {
    fn from(tag: &str) -> Self {
        match tag {
            "stream.online" => Self::StreamOnline,
            "stream.offline" => Self::StreamOffline,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `notification` envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionEvent {
    /// Tag selecting the event shape.
    pub subscription_type: SubscriptionType,
    /// Subscription id, if the server sent one.
    pub subscription_id: Option<String>,
    /// Opaque event data.
    pub event: Value,
}

/// Decoded message kind.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    /// `session_welcome`
    SessionWelcome(SessionInfo),
    /// `notification`
    Notification(SubscriptionEvent),
    /// `session_reconnect`: the server wants us on another endpoint.
    SessionReconnect {
        /// Endpoint to move to.
        reconnect_url: Url,
    },
    /// `session_keepalive`
    SessionKeepalive,
    /// `revocation`: a subscription was cancelled server-side.
    Revocation {
        /// Tag of the revoked subscription.
        subscription_type: Option<String>,
        /// Revocation reason.
        status: Option<String>,
    },
    /// Any other `message_type`.
    Unrecognized(String),
}

/// One decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundEnvelope {
    /// Metadata section.
    pub metadata: Metadata,
    /// Typed message.
    pub message: InboundMessage,
}

#[derive(Deserialize)]
struct RawEnvelope {
    metadata: Metadata,
    #[serde(default)]
    payload: Value,
}

/// Decode one text frame.
pub fn decode_envelope(text: &str) -> Result<InboundEnvelope> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    let payload = raw.payload;

    let message = match raw.metadata.message_type.as_str() {
        "session_welcome" => {
            let session = payload
                .get("session")
                .ok_or(EventSubError::MissingField("payload.session"))?;
            if session.get("id").and_then(Value::as_str).is_none() {
                return Err(EventSubError::MissingField("payload.session.id"));
            }
            InboundMessage::SessionWelcome(SessionInfo::deserialize(session)?)
        }
        "notification" => {
            let tag = payload
                .pointer("/subscription/type")
                .and_then(Value::as_str)
                .ok_or(EventSubError::MissingField("payload.subscription.type"))?;
            InboundMessage::Notification(SubscriptionEvent {
                subscription_type: SubscriptionType::from(tag),
                subscription_id: payload
                    .pointer("/subscription/id")
                    .and_then(Value::as_str)
                    .map(String::from),
                event: payload.get("event").cloned().unwrap_or(Value::Null),
            })
        }
        "session_reconnect" => {
            let raw_url = payload
                .pointer("/session/reconnect_url")
                .and_then(Value::as_str)
                .ok_or(EventSubError::MissingField("payload.session.reconnect_url"))?;
            InboundMessage::SessionReconnect {
                reconnect_url: parse_endpoint(raw_url)?,
            }
        }
        "session_keepalive" => InboundMessage::SessionKeepalive,
        "revocation" => InboundMessage::Revocation {
            subscription_type: payload
                .pointer("/subscription/type")
                .and_then(Value::as_str)
                .map(String::from),
            status: payload
                .pointer("/subscription/status")
                .and_then(Value::as_str)
                .map(String::from),
        },
        other => InboundMessage::Unrecognized(other.to_string()),
    };

    Ok(InboundEnvelope {
        metadata: raw.metadata,
        message,
    })
}
