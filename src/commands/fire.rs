use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use uuid::Uuid;

use adpulse::{
    AdDescriptor, AdEngine, AdEventType, AdType, EventStore,
    config::load_or_default,
};

#[derive(Args)]
pub struct FireArgs {
    /// Placement identifier; generated when omitted
    #[arg(long)]
    pub placement_id: Option<String>,

    /// Ad type (search_result, new_tab_page, notification)
    #[arg(long, default_value = "search_result")]
    pub ad_type: String,

    /// Event type to fire (served, viewed, clicked)
    #[arg(long, default_value = "viewed")]
    pub event_type: String,

    /// Path to a JSON ad descriptor
    #[arg(long, conflicts_with = "descriptor_json")]
    pub descriptor: Option<PathBuf>,

    /// Inline JSON ad descriptor
    #[arg(long)]
    pub descriptor_json: Option<String>,

    /// Emit the stored record as pretty-printed JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(config_path: Option<PathBuf>, args: FireArgs) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;

    let ad_type: AdType = args.ad_type.parse().map_err(|err: String| anyhow!(err))?;
    let event_type: AdEventType = args
        .event_type
        .parse()
        .map_err(|err: String| anyhow!(err))?;

    let raw = match (&args.descriptor, &args.descriptor_json) {
        (Some(path), None) => fs::read_to_string(path)
            .with_context(|| format!("failed to read descriptor {}", path.display()))?,
        (None, Some(inline)) => inline.clone(),
        (None, None) => bail!("either --descriptor or --descriptor-json is required"),
        (Some(_), Some(_)) => unreachable!("clap rejects conflicting descriptor arguments"),
    };
    let descriptor: AdDescriptor =
        serde_json::from_str(&raw).context("invalid ad descriptor JSON")?;

    let placement_id = args
        .placement_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let store = Arc::new(EventStore::open(
        config.event_store_path(),
        config.worker_id,
    )?);
    let engine = AdEngine::from_config(ad_type, store, &config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let record = runtime.block_on(engine.fire_event(&placement_id, descriptor, event_type))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "fired {} for placement {} (event id {})",
            record.event_type, record.placement_id, record.event_id
        );
    }
    Ok(())
}
