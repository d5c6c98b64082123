//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::PipeSettings;

/// Resolve the path to the settings file (`~/.pipe/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pipe").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PipeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. An unreadable file, invalid JSON, or a
/// value of the wrong type is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PipeSettings> {
    let defaults = serde_json::to_value(PipeSettings::default())?;
    let parse_err = |source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let merged = match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(?path, "loading settings from file");
            let user: Value = serde_json::from_str(&content).map_err(parse_err)?;
            deep_merge(defaults, user)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(?path, "settings file not found, using defaults");
            defaults
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut settings: PipeSettings = serde_json::from_value(merged).map_err(parse_err)?;
    apply_env_overrides(&mut settings);
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

/// Apply `PIPE_*` environment variable overrides.
///
/// Invalid values are logged and ignored (the file/default value stays).
pub fn apply_env_overrides(settings: &mut PipeSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
pub fn apply_overrides<F>(settings: &mut PipeSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("PIPE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.ranged::<u16>("PIPE_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.ranged::<usize>("PIPE_MAX_MESSAGE_SIZE", 1024, 1_073_741_824) {
        settings.server.max_message_size = v;
    }
    if let Some(v) = env.ranged::<usize>("PIPE_SEND_QUEUE", 1, 1_000_000) {
        settings.server.send_queue_capacity = v;
    }
    if let Some(v) = env.ranged::<u64>("PIPE_PING_INTERVAL", 1, 3600) {
        settings.server.ping_interval_secs = v;
    }
    if let Some(v) = env.ranged::<u64>("PIPE_PONG_TIMEOUT", 1, 3600) {
        settings.server.pong_timeout_secs = v;
    }
    if let Some(v) = env.string("PIPE_CONTROLLER_HEADER") {
        settings.server.controller_header = v.to_ascii_lowercase();
    }

    // ── Reaper ──────────────────────────────────────────────────────
    if let Some(v) = env.ranged::<u64>("PIPE_REAP_INTERVAL", 1, 86_400) {
        settings.reaper.interval_secs = v;
    }
    if let Some(v) = env.ranged::<u64>("PIPE_REAP_GRACE", 0, 86_400) {
        settings.reaper.grace_secs = v;
    }

    // ── Shutdown ────────────────────────────────────────────────────
    if let Some(v) = env.ranged::<u64>("PIPE_DRAIN_POLL", 1, 3600) {
        settings.shutdown.drain_poll_secs = v;
    }
    if let Some(v) = env.ranged::<u64>("PIPE_SHUTDOWN_TIMEOUT", 1, 3600) {
        settings.shutdown.timeout_secs = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("PIPE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("PIPE_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a number and accept it only within `min..=max`.
pub fn parse_in_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    let n = val.trim().parse::<T>().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ── Variable readers ────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, kind: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = (self.lookup)(name)?;
        let result = parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, kind, "invalid env var, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, "bool", parse_bool)
    }

    fn ranged<T>(&self, name: &str, min: T, max: T) -> Option<T>
    where
        T: FromStr + PartialOrd + Copy,
    {
        self.parsed(name, std::any::type_name::<T>(), |v| parse_in_range(v, min, max))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_skips_null() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        assert_eq!(deep_merge(target, source)["a"], 1);
    }

    #[test]
    fn merge_replaces_arrays() {
        let target = serde_json::json!({"a": [1, 2, 3]});
        let source = serde_json::json!({"a": [9]});
        assert_eq!(deep_merge(target, source)["a"], serde_json::json!([9]));
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.reaper.grace_secs, 60);
    }

    #[test]
    fn default_load_reads_the_home_settings_file() {
        match (load_settings(), load_settings_from_path(&settings_path())) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (a, b) => assert_eq!(a.is_err(), b.is_err()),
        }
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"reaper":{"graceSecs":5},"logging":{"json":true}}"#).unwrap();
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.reaper.grace_secs, 5);
        assert_eq!(settings.reaper.interval_secs, 600);
        assert!(settings.logging.json);
    }

    #[test]
    fn wrong_value_type_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"port":"eighty"}}"#).unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("settings.json"));
    }

    #[test]
    fn directory_path_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings_from_path(dir.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply_valid_values() {
        let mut settings = PipeSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("PIPE_PORT", "9443"),
                ("PIPE_REAP_GRACE", "0"),
                ("PIPE_LOG_JSON", "on"),
                ("PIPE_CONTROLLER_HEADER", "X-Controller"),
            ]),
        );
        assert_eq!(settings.server.port, 9443);
        assert_eq!(settings.reaper.grace_secs, 0);
        assert!(settings.logging.json);
        assert_eq!(settings.server.controller_header, "x-controller");
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let mut settings = PipeSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("PIPE_PORT", "not-a-port"),
                ("PIPE_REAP_INTERVAL", "0"),
                ("PIPE_LOG_JSON", "maybe"),
                ("PIPE_HOST", ""),
            ]),
        );
        assert_eq!(settings, PipeSettings::default());
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for v in ["true", "1", "YES", "On"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["false", "0", "no", "OFF"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_in_range::<u16>("80", 1, 100), Some(80));
        assert_eq!(parse_in_range::<u16>(" 100 ", 1, 100), Some(100));
        assert_eq!(parse_in_range::<u16>("0", 1, 100), None);
        assert_eq!(parse_in_range::<u64>("601", 1, 600), None);
        assert_eq!(parse_in_range::<usize>("-1", 0, 10), None);
    }
}
