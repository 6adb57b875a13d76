mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use cli::{Args, Command};
use config::AppConfig;
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;
    init_tracing(&config.log.level);

    match args.command {
        Command::Run {
            scenario,
            time,
            power,
            output,
        } => commands::run_command(
            &config,
            scenario.as_deref(),
            time,
            power,
            output.as_deref(),
        ),
        Command::Random { seed, output } => commands::random_command(seed, output.as_deref()),
        Command::Inspect {
            scenario,
            concentration,
        } => commands::inspect_command(&config, scenario.as_deref(), concentration),
    }
}
