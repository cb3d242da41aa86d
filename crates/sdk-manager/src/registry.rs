//! Local SDK registry
//!
//! Scans the SDK root for installed versions. A directory counts as an
//! installed SDK only if `sdk-core/manifest.json` parses; anything else is
//! skipped without failing the scan.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::current::CurrentPointer;
use crate::error::{Result, SdkError};
use crate::guard::ArchiveGuard;
use crate::manifest::{Manifest, ManifestStatus, SDK_CORE_DIR};

/// A directory under the SDK root and what its manifest said
#[derive(Debug, Clone)]
pub struct ScannedEntry {
    pub path: PathBuf,
    pub status: ManifestStatus,
}

/// Installed SDK registry
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
    current: CurrentPointer,
}

impl Registry {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            current: CurrentPointer::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current(&self) -> &CurrentPointer {
        &self.current
    }

    /// Inspect every candidate directory under the root
    pub async fn scan(&self) -> Result<Vec<ScannedEntry>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut scanned = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            // The pointer and legacy links must not be counted twice
            if file_type.is_symlink() || !file_type.is_dir() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            let path = entry.path();
            let status = ManifestStatus::read(&path).await;
            scanned.push(ScannedEntry { path, status });
        }

        scanned.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(scanned)
    }

    /// All installed SDK manifests
    pub async fn list_local(&self) -> Result<Vec<Manifest>> {
        let mut manifests = Vec::new();
        for entry in self.scan().await? {
            match entry.status {
                ManifestStatus::Valid(manifest) => manifests.push(manifest),
                ManifestStatus::Corrupt(reason) => {
                    warn!("Ignoring SDK at {:?} with a corrupt manifest: {}", entry.path, reason);
                }
                ManifestStatus::Missing => {
                    debug!("Skipping {:?}: no manifest", entry.path);
                }
            }
        }
        Ok(manifests)
    }

    /// Versions of all installed SDKs
    pub async fn list_local_versions(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .list_local()
            .await?
            .into_iter()
            .map(|m| m.version)
            .collect())
    }

    /// Version of the current SDK, if the pointer resolves to a readable manifest
    pub async fn get_current(&self) -> Option<String> {
        let target = self.current.target().await.ok().flatten()?;
        let version_root = ArchiveGuard::new(&self.root).destination(&target).ok()?;
        ManifestStatus::read(&version_root)
            .await
            .into_manifest()
            .map(|m| m.version)
    }

    /// Core directory of the current SDK
    pub async fn current_path(&self) -> Option<PathBuf> {
        let version = self.get_current().await?;
        self.path_for_sdk(&version).ok()
    }

    /// Root directory of an installed version
    pub fn root_path_for_sdk(&self, version: &str) -> Result<PathBuf> {
        let path = ArchiveGuard::new(&self.root)
            .destination(version)
            .map_err(|_| SdkError::MissingSdk(version.to_string()))?;
        if !path.is_dir() {
            return Err(SdkError::MissingSdk(version.to_string()));
        }
        Ok(path)
    }

    /// Core directory of an installed version
    pub fn path_for_sdk(&self, version: &str) -> Result<PathBuf> {
        let path = self.root_path_for_sdk(version)?.join(SDK_CORE_DIR);
        if !path.is_dir() {
            return Err(SdkError::MissingSdk(version.to_string()));
        }
        Ok(path)
    }
}
