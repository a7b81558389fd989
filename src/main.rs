use anyhow::{Context, Result};
use clap::Parser;
use mattermost_xkcd_bot::cli::Cli;
use mattermost_xkcd_bot::{BotSession, Settings};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();

    // Installed before anything else so an early Ctrl-C still shuts down cleanly.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, shutting down");
                ctrlc_token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for interrupt"),
        }
    });

    let cli = Cli::parse();

    match run(&cli, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("bot stopped with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, shutdown: CancellationToken) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref(), &cli.overrides())
        .context("Failed to load settings")?;

    tracing::info!(
        server_url = %settings.server_url,
        team = %settings.team,
        "starting Mattermost xkcd bot"
    );

    // no log channel yet, so there is nobody to say goodbye to
    let session = tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            tracing::info!("interrupted during startup");
            return Ok(());
        }
        session = BotSession::initialize(&settings) => {
            session.context("Failed to initialize bot session")?
        }
    };

    session.run(shutdown).await?;

    tracing::info!("bot stopped");
    Ok(())
}
