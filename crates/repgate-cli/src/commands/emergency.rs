use chrono::{DateTime, FixedOffset};
use clap::Subcommand;
use repgate_core::EmergencyMinutes;

use super::{open_engine, print_outcome, CliResult};

#[derive(Subcommand)]
pub enum EmergencyAction {
    /// Spend one emergency unlock
    Use,
    /// End the active emergency unlock early (no refund)
    End,
    /// Change emergency unlock settings
    Configure {
        #[arg(long)]
        enabled: Option<bool>,
        /// 10, 15 or 30
        #[arg(long, value_parser = parse_minutes)]
        minutes: Option<EmergencyMinutes>,
        #[arg(long)]
        max_uses: Option<u32>,
    },
}

fn parse_minutes(raw: &str) -> Result<EmergencyMinutes, String> {
    let minutes: u32 = raw.parse().map_err(|e| format!("{e}"))?;
    EmergencyMinutes::try_from(minutes).map_err(|e| e.to_string())
}

pub fn run(action: EmergencyAction, now: DateTime<FixedOffset>) -> CliResult {
    let mut engine = open_engine(now)?;
    let outcome = match action {
        EmergencyAction::Use => engine.spend_emergency(now)?,
        EmergencyAction::End => engine.end_emergency(now)?,
        EmergencyAction::Configure {
            enabled,
            minutes,
            max_uses,
        } => engine.configure_emergency(enabled, minutes, max_uses, now)?,
    };
    print_outcome(&outcome)
}
