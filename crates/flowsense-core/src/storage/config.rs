//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Idle timeout and timer intervals
//! - Flow detection window and notification cooldown
//! - Break reminder policy
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::orchestrator::OrchestratorSettings;

/// Session timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_idle_timeout_min")]
    pub idle_timeout_min: u64,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u64,
}

/// Flow detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_window_min")]
    pub window_min: u64,
    /// Minimum gap between two "entering flow" signals.
    #[serde(default = "default_flow_cooldown_min")]
    pub notification_cooldown_min: u64,
}

/// Break reminder configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreaksConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reminder_after_min")]
    pub reminder_after_min: u64,
    #[serde(default = "default_reminder_cooldown_min")]
    pub reminder_cooldown_min: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub breaks: BreaksConfig,
}

// Default functions
fn default_idle_timeout_min() -> u64 {
    5
}
fn default_tick_interval_secs() -> u64 {
    5
}
fn default_autosave_interval_secs() -> u64 {
    30
}
fn default_window_min() -> u64 {
    10
}
fn default_flow_cooldown_min() -> u64 {
    20
}
fn default_reminder_after_min() -> u64 {
    45
}
fn default_reminder_cooldown_min() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_min: default_idle_timeout_min(),
            tick_interval_secs: default_tick_interval_secs(),
            autosave_interval_secs: default_autosave_interval_secs(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_min: default_window_min(),
            notification_cooldown_min: default_flow_cooldown_min(),
        }
    }
}

impl Default for BreaksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reminder_after_min: default_reminder_after_min(),
            reminder_cooldown_min: default_reminder_cooldown_min(),
        }
    }
}

const MS_PER_SEC: i64 = 1_000;
const MS_PER_MIN: i64 = 60_000;

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?,
                    serde_json::Value::Object(_) => {
                        return Err(invalid("cannot overwrite a whole section".into()))
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Millisecond-based settings for the orchestrator.
    ///
    /// Values too large for `i64` milliseconds saturate at `i64::MAX`.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            idle_timeout_ms: scaled_ms(self.session.idle_timeout_min, MS_PER_MIN),
            tick_interval_ms: scaled_ms(self.session.tick_interval_secs.max(1), MS_PER_SEC),
            autosave_interval_ms: scaled_ms(self.session.autosave_interval_secs.max(1), MS_PER_SEC),
            flow_detection_enabled: self.flow.enabled,
            flow_window_ms: scaled_ms(self.flow.window_min.max(1), MS_PER_MIN),
            flow_notification_cooldown_ms: scaled_ms(self.flow.notification_cooldown_min, MS_PER_MIN),
            break_reminders_enabled: self.breaks.enabled,
            break_after_ms: scaled_ms(self.breaks.reminder_after_min, MS_PER_MIN),
            break_cooldown_ms: scaled_ms(self.breaks.reminder_cooldown_min, MS_PER_MIN),
        }
    }
}

fn scaled_ms(value: u64, unit_ms: i64) -> i64 {
    i64::try_from(value)
        .unwrap_or(i64::MAX)
        .saturating_mul(unit_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[session]\nidle_timeout_min = 2\n").unwrap();
        assert_eq!(parsed.session.idle_timeout_min, 2);
        assert_eq!(parsed.session.tick_interval_secs, 5);
        assert_eq!(parsed.flow, FlowConfig::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("flow.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("session.idle_timeout_min").as_deref(), Some("5"));
        assert!(cfg.get("flow.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("breaks.enabled", "false").unwrap();
        cfg.set("session.autosave_interval_secs", "60").unwrap();
        assert!(!cfg.breaks.enabled);
        assert_eq!(cfg.session.autosave_interval_secs, 60);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("flow.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set("nope.deeper", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("flow.enabled", "not_a_bool"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("session.idle_timeout_min", "-3"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("flow", "1"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("flow.window_min", "15").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().flow.window_min, 15);
    }

    #[test]
    fn load_from_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "session = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn orchestrator_settings_in_milliseconds() {
        let settings = Config::default().orchestrator_settings();
        assert_eq!(settings.idle_timeout_ms, 5 * 60_000);
        assert_eq!(settings.tick_interval_ms, 5_000);
        assert_eq!(settings.autosave_interval_ms, 30_000);
        assert_eq!(settings.flow_window_ms, 600_000);
        assert_eq!(settings.flow_notification_cooldown_ms, 20 * 60_000);
        assert_eq!(settings.break_after_ms, 45 * 60_000);
        assert_eq!(settings.break_cooldown_ms, 30 * 60_000);
        assert_eq!(settings, OrchestratorSettings::default());
    }

    #[test]
    fn huge_values_saturate_instead_of_overflowing() {
        let mut cfg = Config::default();
        cfg.set("session.idle_timeout_min", "1000000000000000").unwrap();
        cfg.set("session.tick_interval_secs", "18446744073709551615").unwrap();
        cfg.set("flow.window_min", "18446744073709551615").unwrap();
        let settings = cfg.orchestrator_settings();
        assert_eq!(settings.idle_timeout_ms, i64::MAX);
        assert_eq!(settings.tick_interval_ms, i64::MAX);
        assert_eq!(settings.flow_window_ms, i64::MAX);

        cfg.set("session.idle_timeout_min", "18446744073709551615").unwrap();
        assert_eq!(cfg.orchestrator_settings().idle_timeout_ms, i64::MAX);
    }
}
