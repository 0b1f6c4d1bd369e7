mod config;
pub mod database;
pub mod memory;

pub use config::{Config, EmergencyDefaults, EnforcementConfig, PlanConfig, UnlockConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ConfigError, Result};

/// Stable key names for persisted aggregates.
pub mod keys {
    pub const BLOCKED_APPS: &str = "blocked_apps";
    pub const UNLOCK_SESSION: &str = "unlock_session";
    pub const EMERGENCY_UNLOCK_STATE: &str = "emergency_unlock_state";
    pub const WORKOUT_IN_PROGRESS: &str = "workout_in_progress";
    pub const LAST_DIRECTIVE: &str = "last_directive";
    pub const ENFORCED_APPS: &str = "enforced_apps";
    pub const LAST_SEEN_AT: &str = "last_seen_at";
}

/// Flat, durable string key/value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Read a JSON value. Missing keys and unparseable values both yield `None`.
///
/// # Errors
/// Only store failures propagate.
pub fn load_json<T: DeserializeOwned>(store: &impl KeyValueStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring unparseable persisted value");
            Ok(None)
        }
    }
}

/// Write `value` as JSON, or remove the key when `value` is `None`.
///
/// # Errors
/// Returns an error if serialization or the store write fails.
pub fn store_json<T: Serialize>(
    store: &mut impl KeyValueStore,
    key: &str,
    value: Option<&T>,
) -> Result<()> {
    match value {
        Some(v) => store.set(key, &serde_json::to_string(v)?),
        None => store.remove(key),
    }
}

/// Returns `~/.config/repgate[-dev]/` based on REPGATE_ENV.
///
/// `REPGATE_DATA_DIR` replaces the path entirely. Set REPGATE_ENV=dev to use
/// the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("REPGATE_DATA_DIR") {
        Some(path) => PathBuf::from(path),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("REPGATE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("repgate-dev")
            } else {
                base_dir.join("repgate")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
