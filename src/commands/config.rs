use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use adpulse::config::load_or_default;

#[derive(Args)]
pub struct ConfigArgs {
    /// Update the hourly frequency cap
    #[arg(long)]
    pub ads_per_hour: Option<u32>,

    /// Update the daily frequency cap
    #[arg(long)]
    pub ads_per_day: Option<u32>,

    /// Update the store operation timeout in milliseconds
    #[arg(long)]
    pub store_timeout_ms: Option<u64>,

    /// Update the data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

pub fn run(config_path: Option<PathBuf>, args: ConfigArgs) -> Result<()> {
    let (mut config, path) = load_or_default(config_path)?;

    let mut changed = false;
    if let Some(cap) = args.ads_per_hour {
        config.caps.ads_per_hour = cap;
        changed = true;
    }
    if let Some(cap) = args.ads_per_day {
        config.caps.ads_per_day = cap;
        changed = true;
    }
    if let Some(timeout) = args.store_timeout_ms {
        config.store_timeout_ms = timeout;
        changed = true;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
        changed = true;
    }

    if changed {
        config.save(&path)?;
        println!("updated {}", path.display());
    } else {
        println!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}
