//! Core error types for repgate-core.
//!
//! Every failure the unlock engine can produce is local and recoverable.
//! Errors are returned as typed results; none of them abort the process.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Core error type for repgate-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Unlock engine errors (limits, quota, enforcement, clock)
    #[error(transparent)]
    Unlock(#[from] UnlockError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors raised by the unlock engine itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnlockError {
    /// Adding another app would exceed the plan tier's cap.
    #[error("blocked app limit reached: plan allows {limit}, attempted {attempted}")]
    LimitExceeded { limit: usize, attempted: usize },

    /// No emergency unlocks left today, or emergency unlocks are disabled.
    #[error("emergency unlocks exhausted; quota resets on {resets_on}")]
    QuotaExhausted { resets_on: NaiveDate },

    /// The OS denied or revoked the app-restriction permission.
    #[error("enforcement unavailable: {reason}")]
    EnforcementUnavailable { reason: String },

    /// The supplied time is earlier than the last time the engine saw.
    #[error("clock moved backwards: now {now} is before last seen {last_seen}")]
    ClockAnomaly {
        now: DateTime<Utc>,
        last_seen: DateTime<Utc>,
    },
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// No usable data directory
    #[error("Cannot determine data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Emergency unlock duration outside the allowed set
    #[error("Invalid emergency duration {0} minutes (allowed: 10, 15, 30)")]
    EmergencyMinutes(u32),

    /// Unknown workout mode name
    #[error("Unknown workout mode '{0}' (expected cozy, normal or tuff)")]
    UnknownMode(String),

    /// Empty application identifier
    #[error("Application identifier must not be empty")]
    EmptyAppId,

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors reported by an enforcement gateway implementation.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Restriction permission is missing or was revoked.
    #[error("restriction permission not granted")]
    NotAuthorized,

    /// The gateway could not hand the directive to the platform.
    #[error("gateway IO failure: {0}")]
    Io(#[from] std::io::Error),

    /// Platform-specific rejection
    #[error("platform rejected directive: {0}")]
    Rejected(String),
}

impl From<GatewayError> for UnlockError {
    fn from(err: GatewayError) -> Self {
        UnlockError::EnforcementUnavailable {
            reason: err.to_string(),
        }
    }
}

impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        CoreError::Unlock(err.into())
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
