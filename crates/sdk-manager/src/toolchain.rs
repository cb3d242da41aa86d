//! Native toolchain installation
//!
//! Toolchain archives hold one top-level `toolchain-<platform>` folder. It is
//! unpacked into a staging directory inside the SDK version and renamed to
//! `<version>/toolchain` in one step, so a failed install never leaves a
//! partial toolchain behind.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{info, debug};

use crate::archive::{self, CancelToken, SdkArchive};
use crate::downloader::{Downloader, ProgressCallback};
use crate::error::{Result, SdkError};
use crate::guard::ArchiveGuard;

/// Toolchain directory name inside a version root
pub const TOOLCHAIN_DIR: &str = "toolchain";

/// Toolchain platform name for the running host
pub fn host_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "mac"
    } else {
        "linux"
    }
}

/// Installs toolchains into installed SDK versions
#[derive(Debug, Clone)]
pub struct ToolchainInstaller {
    root: PathBuf,
    downloader: Downloader,
}

impl ToolchainInstaller {
    pub fn new(root: &Path, downloader: Downloader) -> Self {
        Self {
            root: root.to_path_buf(),
            downloader,
        }
    }

    /// Toolchain location for a version, if installed
    pub fn toolchain_path(&self, sdk_version: &str) -> Option<PathBuf> {
        let path = ArchiveGuard::new(&self.root)
            .destination(sdk_version)
            .ok()?
            .join(TOOLCHAIN_DIR);
        path.is_dir().then_some(path)
    }

    /// Download and install a toolchain
    pub async fn install_from_url(
        &self,
        url: &str,
        sdk_version: &str,
        platform: &str,
        progress: Option<&ProgressCallback>,
    ) -> Result<PathBuf> {
        info!("Downloading toolchain...");
        let file = self.downloader.download_to_temp(url, progress).await?;
        self.install_from_file(file, sdk_version, platform).await
    }

    /// Install a toolchain from a local archive
    pub async fn install_from_path(
        &self,
        path: &Path,
        sdk_version: &str,
        platform: &str,
    ) -> Result<PathBuf> {
        let file = File::open(path)?;
        self.install_from_file(file, sdk_version, platform).await
    }

    /// Install a toolchain from an open archive
    pub async fn install_from_file(
        &self,
        file: File,
        sdk_version: &str,
        platform: &str,
    ) -> Result<PathBuf> {
        info!("Extracting toolchain...");

        let version_root = ArchiveGuard::new(&self.root).destination(sdk_version)?;
        if !version_root.is_dir() {
            return Err(SdkError::MissingSdk(sdk_version.to_string()));
        }
        let toolchain_path = version_root.join(TOOLCHAIN_DIR);
        if toolchain_path.exists() {
            return Err(SdkError::ToolchainInstalled(sdk_version.to_string()));
        }

        let (archive, index) = archive::blocking(move || {
            let mut archive = SdkArchive::new(file);
            let index = archive.index(None)?;
            Ok((archive, index))
        })
        .await?;
        ArchiveGuard::check_members(&index.members)?;

        let staging = tempfile::Builder::new()
            .prefix(".toolchain-")
            .tempdir_in(&version_root)?;
        let staging_path = staging.path().to_path_buf();
        // Dropped before `staging`, so the temp dir is removed only after extraction stops
        let cancel = CancelToken::default();
        let _stop = cancel.cancel_on_drop();
        archive::blocking(move || {
            let mut archive = archive;
            archive.extract_into(&staging_path, &[], &cancel)
        })
        .await?;

        let platform_dir = staging.path().join(format!("toolchain-{}", platform));
        if !platform_dir.is_dir() {
            return Err(SdkError::Toolchain(format!(
                "archive has no toolchain-{} folder",
                platform
            )));
        }

        tokio::fs::rename(&platform_dir, &toolchain_path).await?;
        debug!("Moved {:?} to {:?}", platform_dir, toolchain_path);

        info!("Toolchain for SDK {} installed", sdk_version);
        Ok(toolchain_path)
    }
}
