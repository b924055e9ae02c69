use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use dynamics_tap::api::DynamicsClient;
use dynamics_tap::config::{DEFAULT_ERROR_END_MARKER, DEFAULT_ERROR_START_MARKER, TapConfig};
use dynamics_tap::discover::discover;
use dynamics_tap::report::ErrorReport;
use dynamics_tap::sync::{Catalog, SingerWriter, State, run_sync};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the message stream, so logs go to stderr
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let config = match TapConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            ErrorReport::from_error(&e).emit(None, DEFAULT_ERROR_START_MARKER, DEFAULT_ERROR_END_MARKER);
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ErrorReport::from_error(&e).emit(
                config.error_file_path.as_deref(),
                &config.error_start_marker,
                &config.error_end_marker,
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: &TapConfig) -> Result<()> {
    info!("Starting tap-dynamics for {}", config.organization_uri);

    let client = DynamicsClient::from_config(config, Some(&cli.config))?;

    if cli.discover {
        let catalog = discover(&client, &config.object).await?;
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path)?,
        None => discover(&client, &config.object).await?,
    };

    let state = match &cli.state {
        Some(path) => State::load(path)?,
        None => State::default(),
    };

    let mut sink = SingerWriter::stdout();
    run_sync(&client, &config.start_date, &catalog, state, &mut sink)
        .await
        .context("Sync failed")?;

    info!("Sync complete");
    Ok(())
}
