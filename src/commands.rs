//! CLI commands for the SDK manager
//!
//! Each command is a plain struct with an async `execute`; the binary builds
//! them from the parsed [`crate::cli::Commands`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use pebble_sdk_core::{AppConfig, CHANNEL_KEY};
use pebble_sdk_manager::{compare_versions, ProgressCallback, SdkManager};
use tracing::info;

/// Byte progress bar plus a callback feeding it
pub fn download_progress() -> Result<(ProgressBar, ProgressCallback)> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")?
            .progress_chars("#>-"),
    );

    let bar = pb.clone();
    let callback: ProgressCallback = Box::new(move |downloaded, total| {
        if total > 0 {
            bar.set_length(total);
        }
        bar.set_position(downloaded);
    });
    Ok((pb, callback))
}

/// Where an SDK to install comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
    /// A version name looked up in the SDK store
    Remote(String),
    Url(String),
    Path(PathBuf),
}

impl InstallSource {
    /// URLs and existing files are taken literally; anything else is a version
    pub fn from_arg(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            InstallSource::Url(arg.to_string())
        } else if Path::new(arg).is_file() {
            InstallSource::Path(PathBuf::from(arg))
        } else {
            InstallSource::Remote(arg.to_string())
        }
    }
}

/// Install an SDK
pub struct InstallCommand {
    pub source: InstallSource,
}

impl InstallCommand {
    pub async fn execute(&self, manager: &SdkManager) -> Result<String> {
        let (pb, progress) = download_progress()?;
        let result = match &self.source {
            InstallSource::Remote(version) => manager.install_remote(version, Some(&progress)).await,
            InstallSource::Url(url) => manager.install_from_url(url, Some(&progress)).await,
            InstallSource::Path(path) => manager.install_from_path(path, Some(&progress)).await,
        };
        pb.finish_and_clear();

        let version = result?;
        println!("Installed SDK {}.", version);
        Ok(version)
    }
}

/// Remove an installed SDK
pub struct UninstallCommand {
    pub version: String,
}

impl UninstallCommand {
    pub async fn execute(&self, manager: &SdkManager) -> Result<()> {
        let current = manager.uninstall(&self.version).await?;
        println!("Uninstalled SDK {}.", self.version);
        match current {
            Some(version) => println!("Current SDK is {}.", version),
            None => println!("No SDK is active."),
        }
        Ok(())
    }
}

/// List installed and, optionally, available SDKs
pub struct ListCommand {
    pub remote: bool,
}

impl ListCommand {
    pub async fn execute(&self, manager: &SdkManager) -> Result<Vec<String>> {
        let current = manager.get_current().await;
        let mut installed: Vec<String> = manager.list_local_versions().await?.into_iter().collect();
        installed.sort_by(|a, b| compare_versions(b, a));

        println!("Installed SDKs:");
        if installed.is_empty() {
            println!("  (none)");
        }
        for version in &installed {
            let marker = if current.as_deref() == Some(version) { " (active)" } else { "" };
            println!("  {}{}", version, marker);
        }

        if self.remote {
            println!("Available SDKs (channel '{}'):", manager.channel());
            for sdk in manager.list_remote().await? {
                if let Some(version) = sdk.version {
                    let marker = if installed.contains(&version) { " (installed)" } else { "" };
                    println!("  {}{}", version, marker);
                }
            }
        }

        Ok(installed)
    }
}

/// Switch the current SDK
pub struct ActivateCommand {
    pub version: String,
}

impl ActivateCommand {
    pub async fn execute(&self, manager: &SdkManager) -> Result<()> {
        manager.set_current(&self.version).await?;
        println!("Current SDK is now {}.", self.version);
        Ok(())
    }
}

/// Show or change the release channel
pub struct ChannelCommand {
    /// New channel; `None` prints the current one
    pub set: Option<String>,
}

impl ChannelCommand {
    pub async fn execute(&self, config: &mut AppConfig, config_file: &Path) -> Result<String> {
        if let Some(channel) = &self.set {
            config.set(CHANNEL_KEY, channel.clone());
            config
                .save_to(config_file)
                .await
                .with_context(|| format!("saving {:?}", config_file))?;
            info!("Channel set to '{}'", channel);
        }

        let channel = config.channel().to_string();
        println!("{}", if channel.is_empty() { "(default)" } else { channel.as_str() });
        Ok(channel)
    }
}

/// Link a local firmware build as the `tintin` SDK
pub struct LinkLegacyCommand {
    pub checkout: PathBuf,
}

impl LinkLegacyCommand {
    pub async fn execute(&self, manager: &SdkManager) -> Result<PathBuf> {
        let path = manager.make_legacy_sdk(&self.checkout).await?;
        println!("Generated an SDK linked to {:?}.", self.checkout);
        Ok(path)
    }
}
