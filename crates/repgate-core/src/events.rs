use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::unlock::{Directive, EmergencyMinutes};
use crate::workout::WorkoutMode;

/// Every state change in the engine produces an Event.
/// The presentation layer renders them; the gateway only sees directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    WorkoutStarted {
        mode: WorkoutMode,
        at: DateTime<Utc>,
    },
    /// A completed workout created a new unlock session.
    UnlockEarned {
        session_id: Uuid,
        mode: WorkoutMode,
        reps_completed: u32,
        earned_secs: u64,
        /// True when an earlier session was still running and got replaced.
        replaced_previous: bool,
        at: DateTime<Utc>,
    },
    /// Workout ended without earning anything.
    WorkoutAborted {
        mode: Option<WorkoutMode>,
        at: DateTime<Utc>,
    },
    /// Earned window ran out; grace period started.
    UnlockExpired {
        session_id: Uuid,
        grace_remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Grace period ran out; session cleared.
    Relocked {
        session_id: Uuid,
        at: DateTime<Utc>,
    },
    EmergencyStarted {
        minutes: EmergencyMinutes,
        uses_remaining_today: u32,
        active_until: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    EmergencyEnded {
        /// False when the user ended the window early.
        elapsed: bool,
        at: DateTime<Utc>,
    },
    DirectiveChanged {
        directive: Directive,
        app_count: usize,
        at: DateTime<Utc>,
    },
    AppAdded {
        app_id: String,
        at: DateTime<Utc>,
    },
    AppRemoved {
        app_id: String,
        at: DateTime<Utc>,
    },
    ClockAnomaly {
        last_seen: DateTime<Utc>,
        at: DateTime<Utc>,
    },
}
