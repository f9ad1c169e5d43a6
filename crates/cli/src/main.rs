//! circlefeed CLI entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod args;
mod commands;
mod config;

use crate::args::{Cli, Commands};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        // `config init` must work even when an existing config file is broken
        Commands::Config(args) => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"))?;
            return commands::config::execute(args).await;
        }
        command => command,
    };

    let config = AppConfig::load(cli.config.as_deref())?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.general.log_level);
    init_logging(log_level)?;

    // Execute command
    match command {
        Commands::User(args) => commands::user::execute(args, &config).await,
        Commands::Friends(args) => commands::friends::execute(args, &config).await,
        Commands::Post(args) => commands::post::execute(args, &config).await,
        Commands::Feed(args) => commands::feed::execute(args, &config).await,
        Commands::Comment(args) => commands::engage::comment(args, &config).await,
        Commands::React(args) => commands::engage::react(args, &config).await,
        Commands::Config(args) => commands::config::execute(args).await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}
