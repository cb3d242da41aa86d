//! Pebble SDK manager
//!
//! Command-line entry point: loads the configuration, sets up logging and
//! dispatches to the command objects.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use pebble_sdk::cli::{Cli, Commands};
use pebble_sdk::commands::{
    ActivateCommand, ChannelCommand, InstallCommand, InstallSource, LinkLegacyCommand, ListCommand,
    UninstallCommand,
};
use pebble_sdk::core::AppConfig;
use pebble_sdk::manager::{ManagerConfig, SdkManager};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    debug!("{} v{}", pebble_sdk::core::APP_NAME, pebble_sdk::VERSION);

    tokio::select! {
        result = run(cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cleaning up");
            bail!("Interrupted");
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    let config_file = AppConfig::config_file().context("Cannot determine config path")?;
    let mut config = AppConfig::load_from(&config_file)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    if let Commands::Channel { name } = command {
        ChannelCommand { set: name }
            .execute(&mut config, &config_file)
            .await?;
        return Ok(());
    }

    let manager = SdkManager::new(ManagerConfig::from_app_config(&config))?;
    info!("Using SDKs in {:?}", manager.sdk_dir());

    match command {
        Commands::List { remote } => {
            ListCommand { remote }.execute(&manager).await?;
        }
        Commands::Install { target } => {
            InstallCommand { source: InstallSource::from_arg(&target) }
                .execute(&manager)
                .await?;
        }
        Commands::Uninstall { version } => {
            UninstallCommand { version }.execute(&manager).await?;
        }
        Commands::Activate { version } => {
            ActivateCommand { version }.execute(&manager).await?;
        }
        Commands::LinkLegacy { path } => {
            LinkLegacyCommand { checkout: path }.execute(&manager).await?;
        }
        Commands::Channel { .. } => {}
    }

    Ok(())
}
