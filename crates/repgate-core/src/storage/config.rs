//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Grace period and abandoned-workout timeout
//! - Per-mode workout parameters
//! - Defaults for a fresh emergency unlock quota
//! - The locally known plan tier
//! - Enforcement gateway settings
//!
//! Configuration is stored at `~/.config/repgate/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::plan::{PlanTier, StaticPlan};
use crate::unlock::{EmergencyMinutes, EmergencyUnlockState};
use crate::workout::WorkoutTable;

/// Unlock timing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockConfig {
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// An Earning marker older than this is treated as an abandoned workout.
    #[serde(default = "default_earning_timeout_secs")]
    pub earning_timeout_secs: u64,
}

/// Settings applied when no emergency state has been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyDefaults {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_emergency_minutes")]
    pub minutes_per_use: EmergencyMinutes,
    #[serde(default = "default_max_uses_per_day")]
    pub max_uses_per_day: u32,
}

/// Plan tier as known locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default = "default_tier")]
    pub tier: PlanTier,
    #[serde(default = "default_free_max_blocked_apps")]
    pub free_max_blocked_apps: usize,
    #[serde(default)]
    pub free_emergency_unlock: bool,
}

/// File gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementConfig {
    /// File (relative to the data directory) the restricted set is written to.
    #[serde(default = "default_restrictions_file")]
    pub restrictions_file: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/repgate/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub unlock: UnlockConfig,
    #[serde(default)]
    pub workouts: WorkoutTable,
    #[serde(default)]
    pub emergency: EmergencyDefaults,
    #[serde(default)]
    pub plan: PlanConfig,
    #[serde(default)]
    pub enforcement: EnforcementConfig,
}

// Default functions
fn default_grace_period_secs() -> u64 {
    60
}
fn default_earning_timeout_secs() -> u64 {
    30 * 60
}
fn default_true() -> bool {
    true
}
fn default_emergency_minutes() -> EmergencyMinutes {
    EmergencyMinutes::Fifteen
}
fn default_max_uses_per_day() -> u32 {
    1
}
fn default_tier() -> PlanTier {
    PlanTier::Free
}
fn default_free_max_blocked_apps() -> usize {
    3
}
fn default_restrictions_file() -> String {
    "restrictions.json".into()
}

const MAX_GRACE_PERIOD_SECS: u64 = 24 * 60 * 60;
const MAX_EARNING_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

impl UnlockConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.grace_period_secs > MAX_GRACE_PERIOD_SECS {
            return Err(ConfigError::InvalidValue {
                key: "unlock.grace_period_secs".into(),
                message: format!("must be at most {MAX_GRACE_PERIOD_SECS}"),
            });
        }
        if !(1..=MAX_EARNING_TIMEOUT_SECS).contains(&self.earning_timeout_secs) {
            return Err(ConfigError::InvalidValue {
                key: "unlock.earning_timeout_secs".into(),
                message: format!("must be between 1 and {MAX_EARNING_TIMEOUT_SECS}"),
            });
        }
        Ok(())
    }
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
            earning_timeout_secs: default_earning_timeout_secs(),
        }
    }
}

impl Default for EmergencyDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            minutes_per_use: default_emergency_minutes(),
            max_uses_per_day: default_max_uses_per_day(),
        }
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            tier: default_tier(),
            free_max_blocked_apps: default_free_max_blocked_apps(),
            free_emergency_unlock: false,
        }
    }
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            restrictions_file: default_restrictions_file(),
        }
    }
}

impl EmergencyDefaults {
    pub fn initial_state(&self) -> EmergencyUnlockState {
        EmergencyUnlockState::new(self.enabled, self.minutes_per_use, self.max_uses_per_day)
    }
}

impl PlanConfig {
    pub fn resolver(&self) -> StaticPlan {
        StaticPlan {
            tier: self.tier,
            free_max_blocked_apps: self.free_max_blocked_apps,
            free_emergency_unlock: self.free_emergency_unlock,
        }
    }
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
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the values are invalid.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)?;
                cfg.validate()?;
                Ok(cfg)
            }
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
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Reject values that parse but make no sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.unlock.validate()?;
        self.workouts
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                key: "workouts".into(),
                message: e.to_string(),
            })
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

    /// Update a value in memory by dot-separated key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }
}
