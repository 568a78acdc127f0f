//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ScoutSettings::default()`]
//! 2. If `~/.scout/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `SCOUT_*` environment variable overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::ScoutSettings;

const CONNECT_TIMEOUT_RANGE: (u64, u64) = (100, 600_000);

/// Resolve the path to the settings file (`~/.scout/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".scout").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ScoutSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an out-of-range value
/// in the file is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ScoutSettings> {
    let defaults = serde_json::to_value(ScoutSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ScoutSettings = serde_json::from_value(merged)?;
    validate(&settings)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
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
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

fn validate(settings: &ScoutSettings) -> Result<()> {
    let timeout = settings.endpoint.connect_timeout_ms;
    let (min, max) = CONNECT_TIMEOUT_RANGE;
    if !(min..=max).contains(&timeout) {
        return Err(SettingsError::InvalidValue(format!(
            "endpoint.connectTimeoutMs must be within {min}..={max}, got {timeout}"
        )));
    }
    Ok(())
}

/// Apply `SCOUT_*` overrides read through `lookup`.
///
/// Invalid values are ignored with a warning, falling back to file/default.
pub fn apply_overrides(settings: &mut ScoutSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("SCOUT_API_URL") {
        settings.endpoint.base_url = v;
    }
    if let Some(v) = read("SCOUT_STREAM_PATH") {
        settings.endpoint.stream_path = v;
    }
    if let Some(v) = read("SCOUT_CONNECT_TIMEOUT_MS") {
        let (min, max) = CONNECT_TIMEOUT_RANGE;
        match parse_u64_range(&v, min, max) {
            Some(ms) => settings.endpoint.connect_timeout_ms = ms,
            None => warn!(key = "SCOUT_CONNECT_TIMEOUT_MS", value = %v, "invalid u64 env var, ignoring"),
        }
    }
    // Greeting may legitimately be set to empty to disable it.
    if let Some(v) = lookup("SCOUT_GREETING") {
        settings.session.greeting = v;
    }
    if let Some(v) = read("SCOUT_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("SCOUT_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn!(key = "SCOUT_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

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

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}
