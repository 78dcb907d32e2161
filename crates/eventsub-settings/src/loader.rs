//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`EventSubSettings::default()`]
//! 2. If `~/.eventsub/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `EVENTSUB_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use eventsub_core::constants::NAME;
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::EventSubSettings;

/// Resolve the path to the settings file (`~/.eventsub/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home)
        .join(format!(".{NAME}"))
        .join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<EventSubSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON or the merged result fails validation, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<EventSubSettings> {
    load_settings_with_env(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, reading overrides through `env`.
pub fn load_settings_with_env<F>(path: &Path, env: F) -> Result<EventSubSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(EventSubSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: EventSubSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides<F>(settings: &mut EventSubSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    // ── Client settings ─────────────────────────────────────────────
    if let Some(v) = read_string(&env, "EVENTSUB_URL") {
        settings.client.url = v;
    }
    if let Some(v) = read_u64(&env, "EVENTSUB_RECONNECT_BASE_MS", 1, 60_000) {
        settings.client.reconnect.base_delay_ms = v;
    }
    if let Some(v) = read_u64(&env, "EVENTSUB_RECONNECT_MAX_MS", 1, 3_600_000) {
        settings.client.reconnect.max_delay_ms = v;
    }
    if let Some(v) = read_usize(&env, "EVENTSUB_EVENT_BUFFER", 1, 65_536) {
        settings.client.event_buffer = v;
    }

    // ── Logging settings ────────────────────────────────────────────
    if let Some(v) = read_string(&env, "EVENTSUB_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_bool(&env, "EVENTSUB_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Reject settings the client cannot run with.
pub fn validate(settings: &EventSubSettings) -> Result<()> {
    let url = &settings.client.url;
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        return Err(SettingsError::InvalidValue(format!(
            "client.url must be a ws:// or wss:// URL, got {url:?}"
        )));
    }
    let reconnect = &settings.client.reconnect;
    if reconnect.base_delay_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "client.reconnect.baseDelayMs must be positive".into(),
        ));
    }
    if reconnect.max_delay_ms < reconnect.base_delay_ms {
        return Err(SettingsError::InvalidValue(format!(
            "client.reconnect.maxDelayMs ({}) is below baseDelayMs ({})",
            reconnect.max_delay_ms, reconnect.base_delay_ms
        )));
    }
    if settings.client.event_buffer == 0 {
        return Err(SettingsError::InvalidValue(
            "client.eventBuffer must be positive".into(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_string<F: Fn(&str) -> Option<String>>(env: &F, name: &str) -> Option<String> {
    env(name).filter(|v| !v.is_empty())
}

fn read_bool<F: Fn(&str) -> Option<String>>(env: &F, name: &str) -> Option<bool> {
    let val = env(name)?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_u64<F: Fn(&str) -> Option<String>>(env: &F, name: &str, min: u64, max: u64) -> Option<u64> {
    let val = env(name)?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_usize<F: Fn(&str) -> Option<String>>(
    env: &F,
    name: &str,
    min: usize,
    max: usize,
) -> Option<usize> {
    let val = env(name)?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "client": {"url": "wss://a/ws", "eventBuffer": 64}
        });
        let source = serde_json::json!({
            "client": {"eventBuffer": 8}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["client"]["eventBuffer"], 8);
        assert_eq!(merged["client"]["url"], "wss://a/ws");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 42);
    }

    // ── load_settings_with_env ──────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = Path::new("/nonexistent/settings.json");
        let settings = load_settings_with_env(path, no_env).unwrap();
        let defaults = EventSubSettings::default();
        assert_eq!(settings.client.url, defaults.client.url);
        assert_eq!(settings.logging.level, defaults.logging.level);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"client": {"reconnect": {"baseDelayMs": 250}}, "logging": {"json": true}}"#,
        )
        .unwrap();

        let settings = load_settings_with_env(&path, no_env).unwrap();
        assert_eq!(settings.client.reconnect.base_delay_ms, 250);
        assert_eq!(settings.client.reconnect.max_delay_ms, 30_000);
        assert!(settings.logging.json);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_with_env(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_http_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"client": {"url": "https://example.test"}}"#).unwrap();

        let result = load_settings_with_env(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"client": {"url": "wss://file.test/ws"}}"#).unwrap();

        let env = env_from(&[
            ("EVENTSUB_URL", "ws://127.0.0.1:9000/ws"),
            ("EVENTSUB_RECONNECT_MAX_MS", "5000"),
            ("EVENTSUB_LOG_LEVEL", "debug"),
            ("EVENTSUB_LOG_JSON", "yes"),
        ]);
        let settings = load_settings_with_env(&path, env).unwrap();
        assert_eq!(settings.client.url, "ws://127.0.0.1:9000/ws");
        assert_eq!(settings.client.reconnect.max_delay_ms, 5000);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = EventSubSettings::default();
        let env = env_from(&[
            ("EVENTSUB_RECONNECT_BASE_MS", "0"),
            ("EVENTSUB_EVENT_BUFFER", "lots"),
            ("EVENTSUB_LOG_JSON", "maybe"),
            ("EVENTSUB_URL", ""),
        ]);
        apply_env_overrides(&mut settings, env);
        assert_eq!(settings.client.reconnect.base_delay_ms, 1000);
        assert_eq!(settings.client.event_buffer, 64);
        assert!(!settings.logging.json);
        assert_eq!(settings.client.url, "wss://eventsub.wss.twitch.tv/ws");
    }

    // ── validate ────────────────────────────────────────────────────

    #[test]
    fn validate_rejects_cap_below_base() {
        let mut settings = EventSubSettings::default();
        settings.client.reconnect.base_delay_ms = 5000;
        settings.client.reconnect.max_delay_ms = 1000;
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(validate(&EventSubSettings::default()).is_ok());
    }

    // ── parse helpers ───────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u64_range("500", 1, 1000), Some(500));
        assert_eq!(parse_u64_range("0", 1, 1000), None);
        assert_eq!(parse_u64_range("-1", 1, 1000), None);
        assert_eq!(parse_usize_range("65537", 1, 65_536), None);
    }
}
