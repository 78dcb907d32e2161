//! Package-level constants.

/// Current version of the client (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "eventsub";

/// Twitch EventSub WebSocket endpoint used until the server redirects us.
pub const DEFAULT_EVENTSUB_URL: &str = "wss://eventsub.wss.twitch.tv/ws";

/// Capacity of the client event broadcast channel.
pub const DEFAULT_EVENT_BUFFER: usize = 64;
