//! # eventsub
//!
//! EventSub client binary — loads settings, connects, and logs stream
//! events until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use eventsub_client::{ClientConfig, ClientEvent, EventStreamClient, Notification};
use eventsub_settings::EventSubSettings;
use tokio::sync::broadcast::{self, error::RecvError};

/// EventSub streaming client.
#[derive(Parser, Debug)]
#[command(name = "eventsub", version, about = "EventSub streaming client")]
struct Cli {
    /// Endpoint to connect to (overrides settings).
    #[arg(long)]
    url: Option<String>,

    /// Settings file (default: `~/.eventsub/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level filter, e.g. `debug` or `eventsub_client=trace` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Fold command-line overrides into loaded settings.
    fn apply(&self, settings: &mut EventSubSettings) {
        if let Some(ref url) = self.url {
            settings.client.url.clone_from(url);
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

/// Log every client event until the channel closes.
async fn log_events(mut events: broadcast::Receiver<ClientEvent>) {
    loop {
        match events.recv().await {
            Ok(ClientEvent::Notification(Notification::StreamOnline(online))) => {
                tracing::info!(
                    broadcaster_user_id = %online.broadcaster_user_id,
                    login = online.broadcaster_user_login.as_deref().unwrap_or(""),
                    "stream online"
                );
            }
            Ok(ClientEvent::Notification(Notification::StreamOffline(offline))) => {
                tracing::info!(
                    broadcaster_user_id = %offline.broadcaster_user_id,
                    "stream offline"
                );
            }
            Ok(event) => tracing::debug!(?event, "client event"),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event consumer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings come first: they carry the log level.
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(eventsub_settings::settings_path);
    let mut settings = eventsub_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    eventsub_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    let client = EventStreamClient::new(ClientConfig::from_settings(&settings.client))
        .context("Invalid client configuration")?;
    let consumer = tokio::spawn(log_events(client.subscribe()));

    tracing::info!(
        version = eventsub_core::constants::VERSION,
        url = %client.target_url(),
        "starting client"
    );
    client.connect().await;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    client.disconnect().await;
    drop(client);
    let _ = consumer.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
