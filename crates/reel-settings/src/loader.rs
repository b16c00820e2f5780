//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ReelSettings::default()`]
//! 2. If a settings file exists, deep-merge its values over the defaults
//! 3. Apply `REEL_*` environment variable overrides (highest priority)
//!
//! Command-line flags are applied on top of the result by the binary.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::ReelSettings;

/// Resolve the path to the user settings file (`~/.reel/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".reel").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ReelSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<ReelSettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Load an explicitly requested config file with env var overrides.
///
/// Unlike [`load_settings_from_path`], a missing file is an error.
pub fn load_config_file(path: &Path) -> Result<ReelSettings> {
    if !path.is_file() {
        return Err(SettingsError::NotFound {
            path: path.to_path_buf(),
        });
    }
    load_settings_from_path(path)
}

fn read_layered(path: &Path) -> Result<ReelSettings> {
    let defaults = serde_json::to_value(ReelSettings::default())?;

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
/// Invalid values are ignored with a warning (falling back to file/default).
pub fn apply_env_overrides(settings: &mut ReelSettings) {
    // ── Browser ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("REEL_CHROME_PATH") {
        settings.browser.executable = Some(v);
    }
    if let Some(v) = read_env_u16("REEL_DEBUG_PORT", 1, 65535) {
        settings.browser.debug_port = v;
    }
    if let Some(v) = read_env_u64("REEL_DISCOVERY_TIMEOUT_MS", 100, 600_000) {
        settings.browser.discovery_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("REEL_FRAME_TIMEOUT_MS", 100, 600_000) {
        settings.browser.frame_timeout_ms = v;
    }

    // ── Video ───────────────────────────────────────────────────────
    if let Some(v) = read_env_string("REEL_FFMPEG_PATH") {
        settings.video.ffmpeg = Some(v);
    }
    if let Some(v) = read_env_string("REEL_FRAMES_DIR") {
        settings.video.frames_dir = v;
    }
    if let Some(v) = read_env_string("REEL_OUTPUT_DIR") {
        settings.video.output_dir = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("REEL_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}
