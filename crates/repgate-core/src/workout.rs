//! Workout modes and the workout-to-time converter.
//!
//! Each mode carries its own targets and an `earned_secs_per_rep` multiplier.
//! The multiplier is data, not an ordering of modes: a "harder" mode does not
//! automatically earn more per rep unless the table says so.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutMode {
    Cozy,
    Normal,
    Tuff,
}

impl WorkoutMode {
    pub const ALL: [WorkoutMode; 3] = [WorkoutMode::Cozy, WorkoutMode::Normal, WorkoutMode::Tuff];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkoutMode::Cozy => "cozy",
            WorkoutMode::Normal => "normal",
            WorkoutMode::Tuff => "tuff",
        }
    }
}

impl fmt::Display for WorkoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkoutMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cozy" => Ok(WorkoutMode::Cozy),
            "normal" => Ok(WorkoutMode::Normal),
            "tuff" => Ok(WorkoutMode::Tuff),
            other => Err(ValidationError::UnknownMode(other.to_string())),
        }
    }
}

/// Per-mode workout parameters. Never mutated at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkoutModeConfig {
    pub target_reps: u32,
    pub target_duration_secs: u64,
    pub inter_rep_pause_secs: u64,
    pub earned_secs_per_rep: f64,
}

impl WorkoutModeConfig {
    /// Seconds of unlock time for `reps_completed` reps.
    ///
    /// Partial sessions are credited proportionally.
    pub fn earned_secs(&self, reps_completed: u32) -> u64 {
        let raw = (reps_completed as f64 * self.earned_secs_per_rep).round();
        if raw.is_finite() && raw > 0.0 {
            raw as u64
        } else {
            0
        }
    }

    /// Unlock time a full session at `target_reps` would earn.
    pub fn full_reward_secs(&self) -> u64 {
        self.earned_secs(self.target_reps)
    }

    fn validate(&self, mode: WorkoutMode) -> Result<(), ValidationError> {
        if !self.earned_secs_per_rep.is_finite() || self.earned_secs_per_rep < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: format!("workouts.{mode}.earned_secs_per_rep"),
                message: "must be a finite, non-negative number".into(),
            });
        }
        if self.target_reps == 0 {
            return Err(ValidationError::InvalidValue {
                field: format!("workouts.{mode}.target_reps"),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Lookup table from mode to its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTable {
    #[serde(default = "default_cozy")]
    pub cozy: WorkoutModeConfig,
    #[serde(default = "default_normal")]
    pub normal: WorkoutModeConfig,
    #[serde(default = "default_tuff")]
    pub tuff: WorkoutModeConfig,
}

fn default_cozy() -> WorkoutModeConfig {
    WorkoutModeConfig {
        target_reps: 10,
        target_duration_secs: 120,
        inter_rep_pause_secs: 4,
        earned_secs_per_rep: 60.0,
    }
}

fn default_normal() -> WorkoutModeConfig {
    WorkoutModeConfig {
        target_reps: 20,
        target_duration_secs: 180,
        inter_rep_pause_secs: 3,
        earned_secs_per_rep: 60.0,
    }
}

fn default_tuff() -> WorkoutModeConfig {
    WorkoutModeConfig {
        target_reps: 30,
        target_duration_secs: 240,
        inter_rep_pause_secs: 2,
        earned_secs_per_rep: 80.0,
    }
}

impl Default for WorkoutTable {
    fn default() -> Self {
        Self {
            cozy: default_cozy(),
            normal: default_normal(),
            tuff: default_tuff(),
        }
    }
}

impl WorkoutTable {
    pub fn get(&self, mode: WorkoutMode) -> &WorkoutModeConfig {
        match mode {
            WorkoutMode::Cozy => &self.cozy,
            WorkoutMode::Normal => &self.normal,
            WorkoutMode::Tuff => &self.tuff,
        }
    }

    /// Check every mode's parameters.
    ///
    /// # Errors
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        WorkoutMode::ALL
            .iter()
            .try_for_each(|&mode| self.get(mode).validate(mode))
    }

    /// Convert a finished (or aborted) workout into unlock seconds.
    pub fn compute_earned_secs(&self, mode: WorkoutMode, reps_completed: u32) -> u64 {
        self.get(mode).earned_secs(reps_completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_rep_earns_time_in_every_default_mode() {
        let table = WorkoutTable::default();
        for mode in WorkoutMode::ALL {
            assert!(table.compute_earned_secs(mode, 1) > 0, "{mode} earned nothing");
        }
    }

    #[test]
    fn partial_session_gets_proportional_credit() {
        let table = WorkoutTable::default();
        let normal = table.get(WorkoutMode::Normal);
        let half = table.compute_earned_secs(WorkoutMode::Normal, normal.target_reps / 2);
        assert_eq!(half * 2, normal.full_reward_secs());
    }

    #[test]
    fn zero_reps_earn_nothing() {
        let table = WorkoutTable::default();
        assert_eq!(table.compute_earned_secs(WorkoutMode::Tuff, 0), 0);
    }

    #[test]
    fn fractional_multiplier_rounds() {
        let cfg = WorkoutModeConfig {
            target_reps: 10,
            target_duration_secs: 60,
            inter_rep_pause_secs: 1,
            earned_secs_per_rep: 2.5,
        };
        assert_eq!(cfg.earned_secs(3), 8); // 7.5 rounds half away from zero
        assert_eq!(cfg.earned_secs(1), 3);
    }

    #[test]
    fn negative_multiplier_is_rejected() {
        let mut table = WorkoutTable::default();
        table.cozy.earned_secs_per_rep = -1.0;
        assert!(table.validate().is_err());
        assert_eq!(table.compute_earned_secs(WorkoutMode::Cozy, 5), 0);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Tuff".parse::<WorkoutMode>().unwrap(), WorkoutMode::Tuff);
        assert!("easy".parse::<WorkoutMode>().is_err());
    }
}
