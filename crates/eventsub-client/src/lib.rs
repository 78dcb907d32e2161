//! # eventsub-client
//!
//! Resilient client for a streaming event endpoint (Twitch EventSub by default).
//!
//! - **Client**: [`EventStreamClient`] opens the socket, runs the receive loop
//!   and reconnects with capped exponential backoff
//! - **Envelope**: decoding of inbound frames keyed by `metadata.message_type`
//! - **Events**: [`ClientEvent`] broadcast to subscribers
//!
//! # Usage
//!
//! ```no_run
//! use eventsub_client::{ClientConfig, ClientEvent, EventStreamClient};
//!
//! # async fn run() -> eventsub_client::Result<()> {
//! let client = EventStreamClient::new(ClientConfig::default())?;
//! let mut events = client.subscribe();
//! client.connect().await;
//! while let Ok(event) = events.recv().await {
//!     if let ClientEvent::SessionWelcome(session) = event {
//!         println!("session {}", session.id);
//!     }
//! }
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod config;
mod dispatch;
pub mod envelope;
pub mod errors;
pub mod events;

pub use client::EventStreamClient;
pub use config::{ClientConfig, parse_endpoint};
pub use envelope::{
    InboundEnvelope, InboundMessage, Metadata, SessionInfo, SubscriptionEvent, SubscriptionType,
    decode_envelope,
};
pub use errors::{EventSubError, Result};
pub use events::{ClientEvent, Notification, StreamOffline, StreamOnline};
