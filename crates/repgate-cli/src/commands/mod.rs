pub mod apps;
pub mod config;
pub mod emergency;
pub mod workout;

use chrono::{DateTime, FixedOffset, Local};
use repgate_core::storage::{data_dir, Database};
use repgate_core::{Config, EngineSettings, FileGateway, Outcome, StaticPlan, UnlockEngine};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;
pub type Engine = UnlockEngine<Database, FileGateway, StaticPlan>;

pub fn now(at: Option<DateTime<FixedOffset>>) -> DateTime<FixedOffset> {
    at.unwrap_or_else(|| Local::now().fixed_offset())
}

/// Open the engine against the on-disk store and bring it up to date.
pub fn open_engine(now: DateTime<FixedOffset>) -> Result<Engine, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let dir = data_dir()?;
    let gateway = FileGateway::new(dir.join(&config.enforcement.restrictions_file));
    let mut engine = UnlockEngine::new(
        Database::open()?,
        gateway,
        config.plan.resolver(),
        EngineSettings::from_config(&config),
    );
    let outcome = engine.poll(now)?;
    for event in &outcome.events {
        tracing::info!(?event, "housekeeping");
    }
    Ok(engine)
}

pub fn print_outcome(outcome: &Outcome) -> CliResult {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

pub fn status(now: DateTime<FixedOffset>) -> CliResult {
    let engine = open_engine(now)?;
    let snapshot = engine.status(now)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
