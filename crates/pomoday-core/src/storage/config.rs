//! TOML-based application configuration.
//!
//! Stores:
//! - Schedule rules (day span, interval lengths, long breaks, rollover)
//! - Scoring weights
//! - Test-mode time compression
//! - Engine tick period
//!
//! Configuration is stored at `~/.config/pomoday/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::clock::MAX_SCALE_FACTOR;
use crate::error::{ConfigError, CoreError, Result};
use crate::schedule::ScheduleRules;
use crate::scoring::ScoringPolicy;

/// Accelerated time-base used with `--test-mode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestModeConfig {
    /// Simulated seconds per wall second; 160 runs 09:00-17:00 in 3 minutes.
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pomoday/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleRules,
    #[serde(default)]
    pub scoring: ScoringPolicy,
    #[serde(default)]
    pub test_mode: TestModeConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_scale_factor() -> f64 {
    160.0
}
fn default_tick_millis() -> u64 {
    1000
}

impl Default for TestModeConfig {
    fn default() -> Self {
        Self {
            scale_factor: default_scale_factor(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
        }
    }
}

fn unknown(key: &str) -> ConfigError {
    ConfigError::UnknownKey(key.to_string())
}

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
    ) -> std::result::Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(unknown(key));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(|| unknown(key))?;
                let existing = obj.get(part).ok_or_else(|| unknown(key))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_)
                    | serde_json::Value::Array(_)
                    | serde_json::Value::Null => serde_json::from_str(value)
                        .or_else(|_| {
                            if existing.is_null() {
                                Ok(serde_json::Value::String(value.into()))
                            } else {
                                Err(invalid(format!("'{value}' is not valid JSON")))
                            }
                        })?,
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(|| unknown(key))?;
        }

        Err(unknown(key))
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.schedule.validate()?;
        let scale = self.test_mode.scale_factor;
        if !(scale.is_finite() && scale > 0.0 && scale <= MAX_SCALE_FACTOR) {
            return Err(ConfigError::InvalidValue {
                key: "test_mode.scale_factor".into(),
                message: format!("must be a positive number no larger than {MAX_SCALE_FACTOR}"),
            }
            .into());
        }
        if self.engine.tick_millis == 0 {
            return Err(ConfigError::InvalidValue {
                key: "engine.tick_millis".into(),
                message: "must be at least 1".into(),
            }
            .into());
        }
        Ok(())
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
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation; `self` is left unchanged in that case.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| {
            CoreError::from(ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
