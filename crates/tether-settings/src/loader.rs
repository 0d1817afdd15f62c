//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TetherSettings::default()`]
//! 2. If `~/.tether/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `TETHER_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tether_core::logging::LogFormat;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{LogLevel, TetherSettings};

/// Resolve the path to the settings file (`~/.tether/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tether").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TetherSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<TetherSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults deep-merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<TetherSettings> {
    let defaults = serde_json::to_value(TetherSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TetherSettings = serde_json::from_value(merged)?;
    // `null` is skipped by the merge, so 0 is how a file turns the warning off
    if settings.client.outbound_high_water_mark == Some(0) {
        settings.client.outbound_high_water_mark = None;
    }
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
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

/// Apply `TETHER_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut TetherSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Each variable has strict parsing rules; invalid values are logged and
/// ignored (falling back to file/default).
pub fn apply_overrides(settings: &mut TetherSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read_string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let read_u64 = |name: &str, min: u64, max: u64| {
        let val = lookup(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    };

    // ── Client settings ─────────────────────────────────────────────
    if let Some(v) = read_string("TETHER_URL") {
        settings.client.url = v;
    }
    if let Some(v) = read_string("TETHER_USER") {
        settings.client.user_name = v;
    }
    if let Some(v) = read_u64("TETHER_READ_TIMEOUT_MS", 1, 600_000) {
        settings.client.read_timeout_ms = v;
    }
    if let Some(v) = read_u64("TETHER_WRITE_TIMEOUT_MS", 1, 600_000) {
        settings.client.write_timeout_ms = v;
    }
    if let Some(v) = read_u64("TETHER_PING_TIMEOUT_MS", 1, 600_000) {
        settings.client.ping_timeout_ms = v;
    }
    if let Some(v) = read_u64("TETHER_RECONNECT_COOLDOWN_MS", 0, 3_600_000) {
        settings.client.reconnect_cooldown_ms = v;
    }
    if let Some(v) = read_string("TETHER_OUTBOUND_HIGH_WATER_MARK") {
        match parse_usize_range(&v, 1, usize::MAX) {
            Some(n) => settings.client.outbound_high_water_mark = Some(n),
            None if v == "0" || v.eq_ignore_ascii_case("off") => {
                settings.client.outbound_high_water_mark = None;
            }
            None => {
                warn!(key = "TETHER_OUTBOUND_HIGH_WATER_MARK", value = %v, "invalid usize env var, ignoring");
            }
        }
    }

    // ── Logging settings ────────────────────────────────────────────
    if let Some(v) = read_string("TETHER_LOG_LEVEL") {
        match LogLevel::parse(&v) {
            Some(level) => settings.logging.level = level,
            None => warn!(key = "TETHER_LOG_LEVEL", value = %v, "invalid log level, ignoring"),
        }
    }
    if let Some(v) = read_string("TETHER_LOG_FORMAT") {
        match LogFormat::parse(&v) {
            Some(format) => settings.logging.format = format,
            None => warn!(key = "TETHER_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"client": {"url": "ws://a", "userName": "bob"}});
        let source = serde_json::json!({"client": {"url": "ws://b"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["client"]["url"], "ws://b");
        assert_eq!(merged["client"]["userName"], "bob");
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
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_file_layer ─────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.client.url, "ws://localhost:5555");
        assert_eq!(settings.client.reconnect_cooldown_ms, 5000);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"client": {"url": "ws://chat.local:9000", "pingTimeoutMs": 250}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.client.url, "ws://chat.local:9000");
        assert_eq!(settings.client.ping_timeout_ms, 250);
        assert_eq!(settings.client.read_timeout_ms, 1000);
        assert_eq!(settings.client.user_name, "bob");
    }

    #[test]
    fn load_null_high_water_mark_keeps_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"client": {"outboundHighWaterMark": null}}"#).unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.client.outbound_high_water_mark, Some(10_000));
    }

    #[test]
    fn load_zero_high_water_mark_disables_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"client": {"outboundHighWaterMark": 0}}"#).unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.client.outbound_high_water_mark, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_file_layer(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_logging_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"logging": {"level": "debug", "format": "json"}}"#).unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.logging.level, LogLevel::Debug);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    // ── apply_overrides ─────────────────────────────────────────────

    #[test]
    fn overrides_client_values() {
        let mut settings = TetherSettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("TETHER_URL", "wss://example.com/chat"),
                ("TETHER_USER", "alice"),
                ("TETHER_READ_TIMEOUT_MS", "2500"),
                ("TETHER_RECONNECT_COOLDOWN_MS", "0"),
            ]),
        );
        assert_eq!(settings.client.url, "wss://example.com/chat");
        assert_eq!(settings.client.user_name, "alice");
        assert_eq!(settings.client.read_timeout_ms, 2500);
        assert_eq!(settings.client.reconnect_cooldown_ms, 0);
    }

    #[test]
    fn invalid_values_are_ignored() {
        let mut settings = TetherSettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("TETHER_PING_TIMEOUT_MS", "0"),
                ("TETHER_WRITE_TIMEOUT_MS", "fast"),
                ("TETHER_LOG_LEVEL", "loud"),
                ("TETHER_URL", ""),
            ]),
        );
        assert_eq!(settings.client.ping_timeout_ms, 1000);
        assert_eq!(settings.client.write_timeout_ms, 1000);
        assert_eq!(settings.logging.level, LogLevel::Info);
        assert_eq!(settings.client.url, "ws://localhost:5555");
    }

    #[test]
    fn high_water_mark_can_be_disabled() {
        let mut settings = TetherSettings::default();
        apply_overrides(
            &mut settings,
            env(&[("TETHER_OUTBOUND_HIGH_WATER_MARK", "off")]),
        );
        assert_eq!(settings.client.outbound_high_water_mark, None);

        apply_overrides(
            &mut settings,
            env(&[("TETHER_OUTBOUND_HIGH_WATER_MARK", "64")]),
        );
        assert_eq!(settings.client.outbound_high_water_mark, Some(64));

        apply_overrides(
            &mut settings,
            env(&[("TETHER_OUTBOUND_HIGH_WATER_MARK", "0")]),
        );
        assert_eq!(settings.client.outbound_high_water_mark, None);
    }

    #[test]
    fn overrides_logging() {
        let mut settings = TetherSettings::default();
        apply_overrides(
            &mut settings,
            env(&[("TETHER_LOG_LEVEL", "trace"), ("TETHER_LOG_FORMAT", "json")]),
        );
        assert_eq!(settings.logging.level, LogLevel::Trace);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("30000", 1, 600_000), Some(30_000));
        assert_eq!(parse_u64_range("0", 1, 600_000), None);
        assert_eq!(parse_u64_range("700000", 1, 600_000), None);
        assert_eq!(parse_u64_range("abc", 1, 600_000), None);
    }

    #[test]
    fn parse_usize_bounds() {
        assert_eq!(parse_usize_range("50", 1, 100), Some(50));
        assert_eq!(parse_usize_range("0", 1, 100), None);
    }
}
