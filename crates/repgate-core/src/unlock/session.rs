//! Unlock session time-window math.
//!
//! A session is an immutable record of when an unlock started and how long it
//! lasts. Remaining time is always recomputed from the stored start instant
//! and a caller-supplied `now`; nothing here counts down. Killing the process
//! mid-window and asking again later gives the same answer.
//!
//! All arithmetic is done on whole Unix seconds so that
//! `remaining + elapsed == earned` holds exactly for `start <= now <= end`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workout::WorkoutMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockSession {
    pub id: Uuid,
    pub mode: WorkoutMode,
    pub reps_completed: u32,
    pub earned_duration_secs: u64,
    pub started_at: DateTime<Utc>,
    pub grace_period_secs: u64,
}

impl UnlockSession {
    pub fn new(
        mode: WorkoutMode,
        reps_completed: u32,
        earned_duration_secs: u64,
        started_at: DateTime<Utc>,
        grace_period_secs: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            reps_completed,
            earned_duration_secs,
            started_at,
            grace_period_secs,
        }
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.earned_duration_secs
    }

    /// Whole seconds since the session started, zero if `now` is before it.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        offset_secs(self.started_at, now).max(0) as u64
    }

    /// Unlock time left. Clamps to the full duration on clock rollback.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        let offset = offset_secs(self.started_at, now);
        if offset < 0 {
            return self.earned_duration_secs;
        }
        self.earned_duration_secs.saturating_sub(offset as u64)
    }

    /// Grace time left. Zero while the earned window is still running.
    pub fn grace_remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        if self.remaining_secs(now) > 0 {
            return 0;
        }
        let grace_end = self
            .earned_duration_secs
            .saturating_add(self.grace_period_secs);
        let offset = offset_secs(self.started_at, now).max(0) as u64;
        grace_end.saturating_sub(offset)
    }

    /// True once both the earned window and the grace period have elapsed.
    pub fn is_over(&self, now: DateTime<Utc>) -> bool {
        self.remaining_secs(now) == 0 && self.grace_remaining_secs(now) == 0
    }

    /// Instant the earned window ends, saturating at the latest representable one.
    pub fn ends_at(&self) -> DateTime<Utc> {
        i64::try_from(self.earned_duration_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|earned| self.started_at.checked_add_signed(earned))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

fn offset_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    to.timestamp() - from.timestamp()
}
