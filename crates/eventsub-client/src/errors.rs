//! Client error types.
//!
//! Transport failures never appear here: they are logged and retried by the
//! connection driver. These errors cover invalid configuration and frames
//! that cannot be decoded.

use thiserror::Error;

/// Errors produced while configuring the client or decoding frames.
#[derive(Debug, Error)]
pub enum EventSubError {
    /// Frame is not valid JSON or lacks the envelope structure.
    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    /// A field required by the message type is absent or has the wrong type.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// Endpoint could not be parsed as a URL.
    #[error("invalid endpoint URL {url:?}: {source}")]
    InvalidUrl {
        /// The rejected input.
        url: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },

    /// Endpoint is a URL but not a WebSocket one.
    #[error("unsupported endpoint scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, EventSubError>;
