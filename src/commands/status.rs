use std::path::PathBuf;

use anyhow::Result;

use adpulse::{EventStore, config::load_or_default, store::PlacementStore};

pub fn run(config_path: Option<PathBuf>) -> Result<()> {
    let (config, path) = load_or_default(config_path)?;
    println!("config:       {}", path.display());
    println!("data dir:     {}", config.data_dir.display());
    println!("ads per hour: {}", config.caps.ads_per_hour);
    println!("ads per day:  {}", config.caps.ads_per_day);
    println!("timeout:      {}ms", config.store_timeout_ms);

    if !config.event_store_path().exists() {
        println!("store:        not yet created");
        return Ok(());
    }

    let store = EventStore::open_read_only(config.event_store_path())?;
    let counts = store.counts()?;
    println!("events:       {}", counts.events);
    println!("deposits:     {}", counts.deposits);
    println!("conversions:  {}", counts.conversions);
    println!("activity:     {}", counts.activity_events);
    Ok(())
}
