mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{
    activity::ActivityCommands,
    config::ConfigArgs,
    covariates::CovariatesArgs,
    events::EventsArgs,
    fire::FireArgs,
};

#[derive(Parser)]
#[command(author, version, about = "adpulse ad-event delivery CLI")]
struct Cli {
    /// Path to the configuration file. Defaults to ~/.config/adpulse/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fire an ad event for a placement
    Fire(FireArgs),
    /// List recorded ad events
    Events(EventsArgs),
    /// Record or inspect user activity
    Activity {
        #[command(subcommand)]
        command: ActivityCommands,
    },
    /// Print the current training covariate snapshot
    Covariates(CovariatesArgs),
    /// Display store counts and effective settings
    Status,
    /// Inspect or update configuration
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    adpulse::logging::init()?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Fire(args) => commands::fire::run(cli.config, args),
        Commands::Events(args) => commands::events::run(cli.config, args),
        Commands::Activity { command } => commands::activity::run(cli.config, command),
        Commands::Covariates(args) => commands::covariates::run(cli.config, args),
        Commands::Status => commands::status::run(cli.config),
        Commands::Config(args) => commands::config::run(cli.config, args),
    }
}
