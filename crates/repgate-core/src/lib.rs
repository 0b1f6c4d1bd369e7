//! # Repgate Core Library
//!
//! Gates a configurable set of distracting apps behind a workout: finishing
//! a workout earns a temporary unlock window, after which the apps are
//! blocked again. This crate is the decision engine; rendering, rep counting
//! and billing live elsewhere.
//!
//! ## Architecture
//!
//! - **Unlock derivation**: a pure function from persisted inputs and a
//!   caller-supplied time to one of Locked / Earning / Unlocked / Expired,
//!   plus an emergency overlay. Nothing ticks; callers poll.
//! - **Engine**: loads, updates and saves the persisted aggregates and tells
//!   the enforcement gateway only when the allow/block directive flips
//! - **Storage**: SQLite key/value persistence and TOML configuration
//! - **Enforcement**: trait for the platform mechanism that blocks apps
//!
//! ## Key Components
//!
//! - [`UnlockEngine`]: composition of store, gateway and plan tier
//! - [`UnlockSession`]: time-window math for an earned unlock
//! - [`EmergencyUnlockState`]: daily emergency unlock quota
//! - [`BlockedAppSet`]: apps under enforcement
//! - [`Config`]: application configuration management

pub mod engine;
pub mod enforcement;
pub mod error;
pub mod events;
pub mod plan;
pub mod registry;
pub mod storage;
pub mod unlock;
pub mod workout;

pub use engine::{EngineSettings, Outcome, SharedEngine, UnlockEngine, UnlockSnapshot};
pub use enforcement::{EnforcementGateway, FileGateway, MemoryGateway};
pub use error::{ConfigError, CoreError, DatabaseError, GatewayError, UnlockError, ValidationError};
pub use events::Event;
pub use plan::{AppLimit, PlanResolver, PlanTier, StaticPlan};
pub use registry::BlockedAppSet;
pub use storage::{Config, Database, KeyValueStore, MemoryStore};
pub use unlock::{
    Directive, DisplayState, EmergencyMinutes, EmergencyUnlockState, UnlockSession, UnlockState,
};
pub use workout::{WorkoutMode, WorkoutModeConfig, WorkoutTable};
