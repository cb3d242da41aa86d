//! Current SDK pointer
//!
//! The active version is recorded in a one-line state file `<root>/current`
//! naming the version directory. Updates write a temp file next to it and
//! rename it over the old one, so readers see either the old or the new
//! target. Older installs used a `current` symlink; it is still read, and
//! the next update replaces it.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, SdkError};
use crate::guard::ArchiveGuard;
use crate::manifest::ManifestStatus;
use crate::version;

/// Well-known name of the pointer inside the SDK root
pub const CURRENT_FILE: &str = "current";

/// The single "active version" reference
#[derive(Debug, Clone)]
pub struct CurrentPointer {
    root: PathBuf,
}

impl CurrentPointer {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    /// Version directory name the pointer refers to, if any
    pub async fn target(&self) -> Result<Option<String>> {
        let path = self.path();
        let metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if metadata.file_type().is_symlink() {
            let link = tokio::fs::read_link(&path).await?;
            let name = link
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
            return Ok(name);
        }

        let contents = tokio::fs::read_to_string(&path).await?;
        let version = contents.trim();
        Ok((!version.is_empty()).then(|| version.to_string()))
    }

    /// Point at an installed version, one with a readable manifest
    pub async fn set(&self, version: &str) -> Result<()> {
        let version_root = ArchiveGuard::new(&self.root)
            .destination(version)
            .map_err(|_| SdkError::MissingSdk(version.to_string()))?;
        if !matches!(ManifestStatus::read(&version_root).await, ManifestStatus::Valid(_)) {
            return Err(SdkError::MissingSdk(version.to_string()));
        }

        self.write_target(version)?;
        info!("Current SDK set to {}", version);
        Ok(())
    }

    /// Replace the state file without validating the target
    fn write_target(&self, version: &str) -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        writeln!(tmp, "{}", version)?;
        tmp.flush()?;
        tmp.persist(self.path()).map_err(|e| e.error)?;
        Ok(())
    }

    /// Put back a previously captured target without touching the runtime.
    ///
    /// Used from cleanup paths that cannot await.
    pub(crate) fn restore_blocking(&self, previous: Option<&str>) -> std::io::Result<()> {
        match previous {
            Some(version) => self.write_target(version),
            None => match std::fs::remove_file(self.path()) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            },
        }
    }

    /// Remove the pointer; a missing pointer is not an error
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(self.path()).await {
            Ok(()) => {
                debug!("Cleared current SDK pointer");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Repair the pointer after `removed` was uninstalled.
    ///
    /// Returns the new target, if any.
    pub async fn on_uninstall(
        &self,
        removed: &str,
        remaining: &BTreeSet<String>,
    ) -> Result<Option<String>> {
        let target = self.target().await?;
        if target.as_deref() != Some(removed) {
            return Ok(target);
        }

        match version::highest(remaining) {
            Some(next) => {
                self.set(next).await?;
                Ok(Some(next.to_string()))
            }
            None => {
                self.clear().await?;
                Ok(None)
            }
        }
    }
}
