use std::path::PathBuf;

use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};

use adpulse::{
    EventStore,
    config::load_or_default,
    user_activity::{UserActivityEvent, UserActivityEventType},
};

#[derive(Subcommand)]
pub enum ActivityCommands {
    /// Record one user activity event
    Record(RecordArgs),
    /// List recent user activity
    List(ListArgs),
}

#[derive(Args)]
pub struct RecordArgs {
    /// Activity event type (e.g. opened_new_tab, clicked_link)
    #[arg(value_name = "EVENT_TYPE")]
    pub event_type: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Window to inspect, in minutes
    #[arg(long, default_value_t = 30)]
    pub window_mins: i64,

    /// Emit results as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(config_path: Option<PathBuf>, command: ActivityCommands) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;

    match command {
        ActivityCommands::Record(args) => {
            let event_type: UserActivityEventType = args
                .event_type
                .parse()
                .map_err(|err: String| anyhow!(err))?;
            let store = EventStore::open(config.event_store_path(), config.worker_id)?;
            store.record_user_activity(&UserActivityEvent {
                event_type,
                created_at: Utc::now(),
            })?;
            println!("recorded {event_type}");
            Ok(())
        }
        ActivityCommands::List(args) => {
            let store = EventStore::open_read_only(config.event_store_path())?;
            let events = store.user_activity_for_window(Duration::minutes(args.window_mins))?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&events)?);
                return Ok(());
            }
            if events.is_empty() {
                println!("no activity in the past {} minutes", args.window_mins);
                return Ok(());
            }
            for event in events {
                println!(
                    "{}  {}",
                    event.created_at.format("%Y-%m-%d %H:%M:%S"),
                    event.event_type
                );
            }
            Ok(())
        }
    }
}
