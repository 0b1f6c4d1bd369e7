use chrono::{DateTime, FixedOffset};
use clap::Subcommand;
use repgate_core::{Config, WorkoutMode};

use super::{open_engine, print_outcome, CliResult};

#[derive(Subcommand)]
pub enum WorkoutAction {
    /// Mark a workout as started (Locked -> Earning)
    Start {
        /// cozy, normal or tuff
        #[arg(long, default_value = "normal")]
        mode: WorkoutMode,
    },
    /// Report a finished workout and earn unlock time
    Complete {
        #[arg(long, default_value = "normal")]
        mode: WorkoutMode,
        /// Reps actually completed; partial sessions earn proportional time
        #[arg(long)]
        reps: u32,
    },
    /// Abandon the workout in progress
    Abort,
    /// Print the workout mode table
    Modes,
}

pub fn run(action: WorkoutAction, now: DateTime<FixedOffset>) -> CliResult {
    match action {
        WorkoutAction::Start { mode } => {
            let mut engine = open_engine(now)?;
            print_outcome(&engine.workout_started(mode, now)?)
        }
        WorkoutAction::Complete { mode, reps } => {
            let mut engine = open_engine(now)?;
            print_outcome(&engine.workout_completed(mode, reps, now)?)
        }
        WorkoutAction::Abort => {
            let mut engine = open_engine(now)?;
            print_outcome(&engine.workout_aborted(now)?)
        }
        WorkoutAction::Modes => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config.workouts)?);
            Ok(())
        }
    }
}
