//! # eventsub-settings
//!
//! Configuration management with layered sources for the EventSub client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`EventSubSettings::default()`]
//! 2. **User file** — `~/.eventsub/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `EVENTSUB_*` overrides (highest priority)
//!
//! There is no process-wide settings instance: the binary loads settings
//! once and hands the relevant sections to the components it builds.
//!
//! # Usage
//!
//! ```no_run
//! use eventsub_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("endpoint: {}", settings.client.url);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
