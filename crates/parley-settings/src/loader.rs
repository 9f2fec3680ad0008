//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ParleySettings::default()`]
//! 2. If `~/.parley/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::ParleySettings;

/// Smallest accepted `PARLEY_MAX_MESSAGES`.
const MIN_MAX_MESSAGES: usize = 100;
/// Largest accepted `PARLEY_MAX_MESSAGES`.
const MAX_MAX_MESSAGES: usize = 1_000_000;

/// Resolve the path to the settings file (`~/.parley/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".parley").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ParleySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ParleySettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults with the file at `path` merged over them, no env overrides.
fn load_file_layer(path: &Path) -> Result<ParleySettings> {
    let defaults = serde_json::to_value(ParleySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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
/// Invalid values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut ParleySettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`, so tests need not touch the
/// process environment.
fn apply_overrides(settings: &mut ParleySettings, lookup: impl Fn(&str) -> Option<String>) {
    let read_string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read_string("PARLEY_API_BASE_URL") {
        settings.api.base_url = v;
    }
    if let Some(raw) = lookup("PARLEY_MAX_MESSAGES") {
        match parse_usize_range(&raw, MIN_MAX_MESSAGES, MAX_MAX_MESSAGES) {
            Some(v) => settings.cache.max_messages = Some(v),
            None => {
                tracing::warn!(key = "PARLEY_MAX_MESSAGES", value = %raw, "invalid usize env var, ignoring");
            }
        }
    }
    if let Some(v) = read_string("PARLEY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_string("PARLEY_CLIENT_NAME") {
        settings.gateway.browser.clone_from(&v);
        settings.gateway.device = v;
    }
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write as _;

    use super::*;
    use crate::errors::SettingsError;

    fn write_settings(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"b": 3});
        let merged = deep_merge(target, source);
        assert_eq!(merged, serde_json::json!({"a": 1, "b": 3}));
    }

    #[test]
    fn merge_nested_objects() {
        let target = serde_json::json!({"api": {"baseUrl": "x"}, "logging": {"level": "info"}});
        let source = serde_json::json!({"logging": {"level": "debug"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["api"]["baseUrl"], "x");
        assert_eq!(merged["logging"]["level"], "debug");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        assert_eq!(deep_merge(target, source), serde_json::json!({"a": 1}));
    }

    #[test]
    fn merge_array_replaces() {
        let target = serde_json::json!({"a": [1, 2, 3]});
        let source = serde_json::json!({"a": [4]});
        assert_eq!(deep_merge(target, source), serde_json::json!({"a": [4]}));
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_file_layer(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, ParleySettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let file = write_settings(r#"{"api": {"baseUrl": "http://localhost:9000/api"}}"#);
        let settings = load_file_layer(file.path()).unwrap();
        assert_eq!(settings.api.base_url, "http://localhost:9000/api");
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.gateway.version, 3);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let file = write_settings("{not json");
        let err = load_file_layer(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    // ── env layer ───────────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut settings = ParleySettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("PARLEY_API_BASE_URL", "http://override/api"),
                ("PARLEY_MAX_MESSAGES", "2500"),
                ("PARLEY_LOG_LEVEL", "debug"),
                ("PARLEY_CLIENT_NAME", "bot"),
            ]),
        );
        assert_eq!(settings.api.base_url, "http://override/api");
        assert_eq!(settings.cache.max_messages, Some(2500));
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.gateway.browser, "bot");
        assert_eq!(settings.gateway.device, "bot");
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut settings = ParleySettings::default();
        apply_overrides(
            &mut settings,
            env(&[("PARLEY_MAX_MESSAGES", "50"), ("PARLEY_API_BASE_URL", "")]),
        );
        assert_eq!(settings.cache.max_messages, None);
        assert_eq!(settings.api.base_url, "https://discordapp.com/api");
    }

    #[test]
    fn parse_usize_range_bounds() {
        assert_eq!(parse_usize_range("100", 100, 200), Some(100));
        assert_eq!(parse_usize_range(" 150 ", 100, 200), Some(150));
        assert_eq!(parse_usize_range("99", 100, 200), None);
        assert_eq!(parse_usize_range("201", 100, 200), None);
        assert_eq!(parse_usize_range("abc", 100, 200), None);
    }
}
