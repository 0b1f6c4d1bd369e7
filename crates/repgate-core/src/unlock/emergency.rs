//! Emergency unlock quota.
//!
//! A workout-independent override with its own fixed duration and a daily
//! quota that refills on the first access after local midnight. All functions
//! here are pure: they take the state by reference and hand back a new value,
//! so a failed spend cannot leave a half-mutated quota behind. Persisting the
//! result is the caller's job.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{UnlockError, ValidationError};

/// Allowed emergency unlock lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum EmergencyMinutes {
    Ten,
    Fifteen,
    Thirty,
}

impl EmergencyMinutes {
    pub fn as_minutes(self) -> u32 {
        match self {
            EmergencyMinutes::Ten => 10,
            EmergencyMinutes::Fifteen => 15,
            EmergencyMinutes::Thirty => 30,
        }
    }

    pub fn as_secs(self) -> u64 {
        u64::from(self.as_minutes()) * 60
    }
}

impl TryFrom<u32> for EmergencyMinutes {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(EmergencyMinutes::Ten),
            15 => Ok(EmergencyMinutes::Fifteen),
            30 => Ok(EmergencyMinutes::Thirty),
            other => Err(ValidationError::EmergencyMinutes(other)),
        }
    }
}

impl From<EmergencyMinutes> for u32 {
    fn from(value: EmergencyMinutes) -> Self {
        value.as_minutes()
    }
}

impl fmt::Display for EmergencyMinutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.as_minutes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyUnlockState {
    pub enabled: bool,
    pub minutes_per_use: EmergencyMinutes,
    pub max_uses_per_day: u32,
    pub uses_remaining_today: u32,
    /// `None` until the first quota read; the first read always refills.
    #[serde(default)]
    pub last_quota_reset_date: Option<NaiveDate>,
    #[serde(default)]
    pub active_until: Option<DateTime<Utc>>,
}

impl Default for EmergencyUnlockState {
    fn default() -> Self {
        Self::new(true, EmergencyMinutes::Fifteen, 1)
    }
}

impl EmergencyUnlockState {
    pub fn new(enabled: bool, minutes_per_use: EmergencyMinutes, max_uses_per_day: u32) -> Self {
        Self {
            enabled,
            minutes_per_use,
            max_uses_per_day,
            uses_remaining_today: max_uses_per_day,
            last_quota_reset_date: None,
            active_until: None,
        }
    }

    /// Apply the midnight refill rule for `today` (a local date).
    ///
    /// Refills once per new day. Repeated reads on the same day, or a day
    /// earlier than the last refill (clock moved back), return the state
    /// unchanged.
    pub fn current_quota(&self, today: NaiveDate) -> Self {
        let due = self.last_quota_reset_date.map_or(true, |last| today > last);
        let mut next = self.clone();
        if due {
            next.uses_remaining_today = next.max_uses_per_day;
            next.last_quota_reset_date = Some(today);
        }
        next.uses_remaining_today = next.uses_remaining_today.min(next.max_uses_per_day);
        next
    }

    /// Spend one emergency unlock starting at `now`; `today` is the caller's
    /// local date.
    ///
    /// # Errors
    /// `QuotaExhausted` when disabled or no uses are left today. The receiver
    /// is never modified.
    pub fn spend_one(&self, now: DateTime<Utc>, today: NaiveDate) -> Result<Self, UnlockError> {
        if !self.enabled || self.uses_remaining_today == 0 {
            return Err(UnlockError::QuotaExhausted {
                resets_on: self.resets_on(today),
            });
        }
        let mut next = self.clone();
        next.uses_remaining_today -= 1;
        next.active_until = Some(now + Duration::seconds(self.minutes_per_use.as_secs() as i64));
        Ok(next)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.active_until.is_some_and(|until| now < until)
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        self.active_until
            .map(|until| (until.timestamp() - now.timestamp()).max(0) as u64)
            .unwrap_or(0)
    }

    /// Drop an elapsed (or unwanted) active window.
    pub fn cleared(&self) -> Self {
        let mut next = self.clone();
        next.active_until = None;
        next
    }

    /// Change the user-facing settings, keeping the quota invariant.
    pub fn with_settings(
        &self,
        enabled: bool,
        minutes_per_use: EmergencyMinutes,
        max_uses_per_day: u32,
    ) -> Self {
        let mut next = self.clone();
        next.enabled = enabled;
        next.minutes_per_use = minutes_per_use;
        if max_uses_per_day > next.max_uses_per_day {
            next.uses_remaining_today += max_uses_per_day - next.max_uses_per_day;
        }
        next.max_uses_per_day = max_uses_per_day;
        next.uses_remaining_today = next.uses_remaining_today.min(max_uses_per_day);
        next
    }

    /// The local date on which the quota next refills.
    pub fn resets_on(&self, today: NaiveDate) -> NaiveDate {
        let base = self.last_quota_reset_date.unwrap_or(today);
        base.succ_opt().unwrap_or(base)
    }
}
