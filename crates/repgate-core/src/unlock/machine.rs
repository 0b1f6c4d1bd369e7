//! Unlock state derivation.
//!
//! The machine state is never stored. It is recomputed on every call from the
//! persisted inputs and the supplied time:
//!
//! ```text
//! Locked --workout starts--> Earning --earned > 0--> Unlocked
//!                              |                        |
//!                              +--aborted / 0s--> Locked |remaining == 0
//!                                                       v
//!              Locked <--grace remaining == 0-------- Expired
//! ```
//!
//! The emergency overlay sits on top of whichever base state applies and
//! never changes it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::emergency::EmergencyUnlockState;
use super::session::UnlockSession;
use crate::workout::WorkoutMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlockState {
    Locked,
    Earning,
    Unlocked,
    /// Earned window is over; the grace period is running.
    Expired,
}

/// What the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    Locked,
    Earning,
    Unlocked,
    Expired,
    EmergencyUnlocked,
}

/// The only thing the enforcement gateway is ever told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    Block,
    Allow,
}

/// Marker persisted when a workout starts and removed when it ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutInProgress {
    pub mode: WorkoutMode,
    pub started_at: DateTime<Utc>,
}

impl WorkoutInProgress {
    /// A marker older than `timeout_secs` belongs to an abandoned workout.
    ///
    /// A deadline past the representable range never arrives.
    pub fn is_stale(&self, now: DateTime<Utc>, timeout_secs: u64) -> bool {
        i64::try_from(timeout_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|timeout| self.started_at.checked_add_signed(timeout))
            .is_some_and(|deadline| now >= deadline)
    }
}

/// Everything the derivation reads.
#[derive(Debug, Clone, Copy)]
pub struct UnlockInputs<'a> {
    pub session: Option<&'a UnlockSession>,
    pub workout: Option<&'a WorkoutInProgress>,
    pub emergency: &'a EmergencyUnlockState,
    pub earning_timeout_secs: u64,
}

/// Derived view of the machine at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockView {
    pub state: UnlockState,
    pub emergency_active: bool,
    pub display: DisplayState,
    pub directive: Directive,
    pub remaining_secs: u64,
    pub grace_remaining_secs: u64,
    pub total_duration_secs: u64,
    pub emergency_remaining_secs: u64,
}

/// Base state from session and workout marker alone.
///
/// A running or grace-period session wins over a workout in progress, so
/// starting a new workout while unlocked does not re-block anything.
pub fn base_state(inputs: &UnlockInputs<'_>, now: DateTime<Utc>) -> UnlockState {
    if let Some(session) = inputs.session {
        if session.remaining_secs(now) > 0 {
            return UnlockState::Unlocked;
        }
        if session.grace_remaining_secs(now) > 0 {
            return UnlockState::Expired;
        }
    }
    match inputs.workout {
        Some(w) if !w.is_stale(now, inputs.earning_timeout_secs) => UnlockState::Earning,
        _ => UnlockState::Locked,
    }
}

/// Display precedence: an earned unlock always shows as `Unlocked`; the
/// emergency overlay only shows over states that would otherwise block or
/// are about to.
pub fn display_state(state: UnlockState, emergency_active: bool) -> DisplayState {
    match (state, emergency_active) {
        (UnlockState::Unlocked, _) => DisplayState::Unlocked,
        (UnlockState::Locked | UnlockState::Expired | UnlockState::Earning, true) => {
            DisplayState::EmergencyUnlocked
        }
        (UnlockState::Locked, false) => DisplayState::Locked,
        (UnlockState::Earning, false) => DisplayState::Earning,
        (UnlockState::Expired, false) => DisplayState::Expired,
    }
}

pub fn directive_for(state: UnlockState, emergency_active: bool) -> Directive {
    match state {
        UnlockState::Unlocked | UnlockState::Expired => Directive::Allow,
        UnlockState::Locked | UnlockState::Earning if emergency_active => Directive::Allow,
        UnlockState::Locked | UnlockState::Earning => Directive::Block,
    }
}

/// Pure derivation of the whole view.
pub fn derive(inputs: &UnlockInputs<'_>, now: DateTime<Utc>) -> UnlockView {
    let state = base_state(inputs, now);
    let emergency_active = inputs.emergency.is_active(now);
    let (remaining_secs, grace_remaining_secs, total_duration_secs) = match inputs.session {
        Some(s) if matches!(state, UnlockState::Unlocked | UnlockState::Expired) => (
            s.remaining_secs(now),
            s.grace_remaining_secs(now),
            s.total_duration_secs(),
        ),
        _ => (0, 0, 0),
    };
    UnlockView {
        state,
        emergency_active,
        display: display_state(state, emergency_active),
        directive: directive_for(state, emergency_active),
        remaining_secs,
        grace_remaining_secs,
        total_duration_secs,
        emergency_remaining_secs: inputs.emergency.remaining_secs(now),
    }
}
