//! SDK manager facade
//!
//! Ties the registry, installer, catalog and legacy linker to one SDK root.
//! Everything it needs comes in through [`ManagerConfig`]; nothing is read
//! from global state.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pebble_sdk_core::AppConfig;
use tracing::{debug, info};

use crate::catalog::{RemoteCatalog, RemoteSdk};
use crate::deps::{DependencyInstaller, ProcessDependencyInstaller};
use crate::downloader::{Downloader, ProgressCallback};
use crate::error::Result;
use crate::installer::Installer;
use crate::legacy::LegacyLinker;
use crate::manifest::Manifest;
use crate::registry::Registry;
use crate::requirements::{RequirementsChecker, ToolRequirements};
use crate::toolchain;

/// Component name bundles use to state which tool versions they support
pub const TOOL_COMPONENT: &str = "pebble-tool";

/// Everything an [`SdkManager`] needs to know about its environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    pub sdk_dir: PathBuf,
    pub download_server: String,
    pub channel: String,
    /// Toolchain platform name (`mac` or `linux`)
    pub platform: String,
    pub python: PathBuf,
    pub npm: PathBuf,
    pub install_toolchain: bool,
    /// Seconds a connection may stay silent
    pub timeout_secs: u64,
    /// Version checked against bundle requirements
    pub tool_version: String,
}

impl ManagerConfig {
    /// Defaults for an SDK root
    pub fn new(sdk_dir: impl Into<PathBuf>) -> Self {
        Self::from_app_config_in(&AppConfig::default(), sdk_dir.into())
    }

    /// Derive the manager settings from the persisted application config
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::from_app_config_in(config, config.sdk_dir())
    }

    fn from_app_config_in(config: &AppConfig, sdk_dir: PathBuf) -> Self {
        Self {
            sdk_dir,
            download_server: config.sdk.download_server.clone(),
            channel: config.channel().to_string(),
            platform: toolchain::host_platform().to_string(),
            python: config.sdk.python.clone(),
            npm: config.sdk.npm.clone(),
            install_toolchain: config.sdk.install_toolchain,
            timeout_secs: config.sdk.timeout_secs,
            tool_version: pebble_sdk_core::VERSION.to_string(),
        }
    }
}

/// Manages the SDK versions installed under one root
pub struct SdkManager {
    config: ManagerConfig,
    registry: Registry,
    catalog: RemoteCatalog,
    installer: Installer,
    deps: Arc<dyn DependencyInstaller>,
}

impl SdkManager {
    /// Manager that runs python/pip/npm and checks requirements against this tool
    pub fn new(config: ManagerConfig) -> Result<Self> {
        let requirements = Arc::new(ToolRequirements::new(TOOL_COMPONENT, config.tool_version.clone()));
        let deps = Arc::new(ProcessDependencyInstaller::new(
            config.python.clone(),
            config.npm.clone(),
        ));
        Self::with_collaborators(config, requirements, deps)
    }

    /// Manager with caller-supplied requirement and dependency handling
    pub fn with_collaborators(
        config: ManagerConfig,
        requirements: Arc<dyn RequirementsChecker>,
        deps: Arc<dyn DependencyInstaller>,
    ) -> Result<Self> {
        let downloader = Downloader::new(config.timeout_secs)?;
        let catalog = RemoteCatalog::new(&config.download_server, downloader.clone());

        let mut installer = Installer::new(
            &config.sdk_dir,
            downloader,
            catalog.clone(),
            requirements,
            deps.clone(),
        );
        if config.install_toolchain {
            installer = installer.with_toolchain(config.platform.clone());
        }

        debug!("SDK root is {:?}", config.sdk_dir);
        Ok(Self {
            registry: Registry::new(&config.sdk_dir),
            catalog,
            installer,
            deps,
            config,
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn sdk_dir(&self) -> &Path {
        &self.config.sdk_dir
    }

    pub fn channel(&self) -> &str {
        &self.config.channel
    }

    pub async fn list_local(&self) -> Result<Vec<Manifest>> {
        self.registry.list_local().await
    }

    pub async fn list_local_versions(&self) -> Result<BTreeSet<String>> {
        self.registry.list_local_versions().await
    }

    pub async fn get_current(&self) -> Option<String> {
        self.registry.get_current().await
    }

    /// SDKs offered on the configured channel
    pub async fn list_remote(&self) -> Result<Vec<RemoteSdk>> {
        Ok(self.catalog.list_available(&self.config.channel).await?)
    }

    pub async fn install_remote(
        &self,
        version: &str,
        progress: Option<&ProgressCallback>,
    ) -> Result<String> {
        self.installer
            .install_remote(version, &self.config.channel, progress)
            .await
    }

    pub async fn install_from_url(
        &self,
        url: &str,
        progress: Option<&ProgressCallback>,
    ) -> Result<String> {
        self.installer.install_from_url(url, progress).await
    }

    pub async fn install_from_path(
        &self,
        path: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<String> {
        self.installer.install_from_path(path, progress).await
    }

    /// Install the host toolchain for an installed version from a local archive
    pub async fn install_toolchain_from_path(&self, path: &Path, version: &str) -> Result<PathBuf> {
        self.installer
            .toolchains()
            .install_from_path(path, version, &self.config.platform)
            .await
    }

    /// Remove a version; returns the current SDK afterwards
    pub async fn uninstall(&self, version: &str) -> Result<Option<String>> {
        self.installer.uninstall(version).await
    }

    pub async fn set_current(&self, version: &str) -> Result<()> {
        self.registry.current().set(version).await
    }

    /// Link a local firmware build as the `tintin` SDK
    pub async fn make_legacy_sdk(&self, checkout: &Path) -> Result<PathBuf> {
        let path = LegacyLinker::new(&self.config.sdk_dir, self.registry.current(), &*self.deps)
            .link(checkout)
            .await?;
        info!("Linked legacy SDK at {:?}", path);
        Ok(path)
    }

    pub fn root_path_for_sdk(&self, version: &str) -> Result<PathBuf> {
        self.registry.root_path_for_sdk(version)
    }

    pub fn path_for_sdk(&self, version: &str) -> Result<PathBuf> {
        self.registry.path_for_sdk(version)
    }

    /// Core directory of the current SDK
    pub async fn current_path(&self) -> Option<PathBuf> {
        self.registry.current_path().await
    }
}
