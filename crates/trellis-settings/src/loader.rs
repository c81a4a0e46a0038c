//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TrellisSettings::default()`]
//! 2. If `~/.trellis/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `TRELLIS_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::TrellisSettings;

/// Resolve the Trellis home directory (`~/.trellis`).
pub fn settings_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".trellis")
}

/// Resolve the path to the settings file (`~/.trellis/settings.json`).
pub fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Resolve the configured database path.
///
/// Absolute paths and `:memory:` are used as-is; relative paths are placed
/// under [`settings_dir`].
pub fn resolve_db_path(settings: &TrellisSettings) -> PathBuf {
    let configured = Path::new(&settings.database.path);
    if configured.is_absolute() || settings.database.path == ":memory:" {
        configured.to_path_buf()
    } else {
        settings_dir().join(configured)
    }
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TrellisSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<TrellisSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Load defaults merged with the settings file, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<TrellisSettings> {
    let defaults = serde_json::to_value(TrellisSettings::default())?;

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

/// Apply `TRELLIS_*` environment variable overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut TrellisSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Each variable has strict parsing rules; invalid values are ignored with a
/// warning and the file/default value is kept.
pub fn apply_overrides<F>(settings: &mut TrellisSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read_string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_string("TRELLIS_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_parsed(&lookup, "TRELLIS_PORT", |s| parse_u16_range(s, 1, 65535)) {
        settings.server.port = v;
    }

    // ── Database ────────────────────────────────────────────────────
    if let Some(v) = read_string("TRELLIS_DB_PATH") {
        settings.database.path = v;
    }
    if let Some(v) = read_parsed(&lookup, "TRELLIS_DB_POOL_SIZE", |s| {
        parse_u32_range(s, 1, 256)
    }) {
        settings.database.pool_size = v;
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = read_string("TRELLIS_JWT_SECRET") {
        settings.auth.jwt_secret = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_parsed(&lookup, "TRELLIS_LOG_LEVEL", parse_enum) {
        settings.logging.level = v;
    }
    if let Some(v) = read_parsed(&lookup, "TRELLIS_LOG_FORMAT", parse_enum) {
        settings.logging.format = v;
    }

    // ── Tasks ───────────────────────────────────────────────────────
    if let Some(v) = read_parsed(&lookup, "TRELLIS_DEFAULT_PAGE_SIZE", |s| {
        parse_u32_range(s, 1, 1000)
    }) {
        settings.tasks.default_page_size = v;
    }
    if let Some(v) = read_parsed(&lookup, "TRELLIS_MAX_PAGE_SIZE", |s| {
        parse_u32_range(s, 1, 1000)
    }) {
        settings.tasks.max_page_size = v;
    }
}

fn read_parsed<F, T, P>(lookup: &F, name: &str, parse: P) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    let val = lookup(name)?;
    let result = parse(&val);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a lowercase enum name through its serde representation.
fn parse_enum<T: serde::de::DeserializeOwned>(val: &str) -> Option<T> {
    serde_json::from_value(Value::String(val.to_lowercase())).ok()
}
