use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Args;

use adpulse::{AdType, EventStore, config::load_or_default, store::PlacementStore};

#[derive(Args)]
pub struct EventsArgs {
    /// Optional ad type to scope results (search_result, new_tab_page, notification)
    #[arg(value_name = "AD_TYPE")]
    pub ad_type: Option<String>,

    /// Number of events to skip
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Maximum number of events to return
    #[arg(long)]
    pub take: Option<usize>,

    /// Emit results as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(config_path: Option<PathBuf>, args: EventsArgs) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;
    let store = EventStore::open_read_only(config.event_store_path())?;

    let mut events = match args.ad_type.as_deref() {
        Some(raw) => {
            let ad_type: AdType = raw.parse().map_err(|err: String| anyhow!(err))?;
            store.events_for_type(ad_type)?
        }
        None => store.list_events()?,
    };

    if args.skip > 0 {
        events = events.into_iter().skip(args.skip).collect();
    }
    if let Some(take) = args.take {
        events.truncate(take);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("no events recorded");
        return Ok(());
    }
    for event in events {
        println!(
            "{}  {:12}  {:8}  placement={}  creative={}",
            event.created_at.format("%Y-%m-%d %H:%M:%S"),
            event.ad_type.to_string(),
            event.event_type.to_string(),
            event.placement_id,
            event.creative_instance_id
        );
    }
    Ok(())
}
