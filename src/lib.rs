pub mod answer;
pub mod assets;
pub mod chart;
pub mod chat;
pub mod cli;
pub mod coerce;
pub mod columns;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod export;
pub mod filter;
pub mod frame;
pub mod frequency;
pub mod income;
pub mod inference;
pub mod io_utils;
pub mod network;
pub mod normalize;
pub mod preprocess;
pub mod session;
pub mod stats;
pub mod table;
pub mod tags;

use std::{env, sync::OnceLock};

use anyhow::{Result, anyhow};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, ConfigArgs},
    config::SurveyConfig,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("maniva_survey", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Columns(args) => columns::execute(&args),
        Commands::Summary(args) => stats::execute_summary(&args),
        Commands::Stats(args) => stats::execute_stats(&args),
        Commands::Dashboard(args) => dashboard::execute(&args),
        Commands::Frequency(args) => frequency::execute(&args),
        Commands::Ask(args) => chat::execute_ask(&args),
        Commands::Chat(args) => chat::execute_chat(&args),
        Commands::Export(args) => export::execute(&args),
        Commands::Network(args) => network::execute(&args),
        Commands::Coordinates(args) => assets::execute_coordinates(&args),
        Commands::Config(args) => handle_config(&args),
    }
}

fn handle_config(args: &ConfigArgs) -> Result<()> {
    let mut config = SurveyConfig::default();
    if let Some(revision) = &args.income_revision {
        let brackets = income::builtin_brackets(revision).ok_or_else(|| {
            anyhow!(
                "Unknown income revision '{revision}' (available: {})",
                income::revisions().join(", ")
            )
        })?;
        config.income.revision = revision.clone();
        config.income.brackets = brackets;
    }
    let yaml = config.to_yaml_string()?;
    io_utils::write_output(args.output.as_deref(), yaml.as_bytes())?;
    info!(
        "Configuration revision {} with income brackets {} written to {}",
        config.revision,
        config.income.revision,
        io_utils::describe_destination(args.output.as_deref())
    );
    Ok(())
}
