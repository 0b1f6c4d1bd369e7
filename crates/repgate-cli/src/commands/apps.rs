use chrono::{DateTime, FixedOffset};
use clap::Subcommand;

use super::{open_engine, print_outcome, CliResult};

#[derive(Subcommand)]
pub enum AppsAction {
    /// Put an app under enforcement
    Add {
        /// Application identifier (bundle id / package name)
        app_id: String,
    },
    /// Stop enforcing an app
    Remove { app_id: String },
    /// List blocked apps as JSON
    List,
}

pub fn run(action: AppsAction, now: DateTime<FixedOffset>) -> CliResult {
    let mut engine = open_engine(now)?;
    match action {
        AppsAction::Add { app_id } => print_outcome(&engine.add_app(&app_id, now)?),
        AppsAction::Remove { app_id } => print_outcome(&engine.remove_app(&app_id, now)?),
        AppsAction::List => {
            let apps = engine.blocked_apps()?;
            println!("{}", serde_json::to_string_pretty(&apps)?);
            Ok(())
        }
    }
}
