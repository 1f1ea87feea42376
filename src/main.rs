// src/main.rs
use anyhow::Context;
use clap::Parser;
use log::{error, info};

use themebooth::cli::{CliOptions, Command};
use themebooth::config::setup_logging;
use themebooth::handlers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliOptions::parse();
    setup_logging(cli.debug);

    let config = cli.config();

    match &cli.command {
        Command::Themes => handlers::list_themes(),
        Command::Quota => handlers::show_quota(&config)
            .await
            .context("Failed to read the daily quota")?,
        Command::Generate(args) => {
            info!("Starting Themebooth batch for theme {}", args.theme);
            if let Err(err) = handlers::generate(&config, args).await {
                error!("{}", err);
                eprintln!("{}", err.notification());
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
