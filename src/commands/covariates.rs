use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Args;

use adpulse::{EventStore, config::load_or_default, covariates::CovariateLog};

#[derive(Args)]
pub struct CovariatesArgs {
    /// Activity window to compute over, in minutes
    #[arg(long, default_value_t = adpulse::covariates::TRAINING_WINDOW_MINUTES)]
    pub window_mins: i64,
}

pub fn run(config_path: Option<PathBuf>, args: CovariatesArgs) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;
    let store = EventStore::open_read_only(config.event_store_path())?;
    let history = store.user_activity_for_window(Duration::minutes(args.window_mins))?;

    let log = CovariateLog::new();
    let covariates = log.training_covariates(&history, Utc::now());
    println!("{}", serde_json::to_string_pretty(&covariates)?);
    Ok(())
}
