//! SDK manifest handling

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Core subdirectory inside each installed version
pub const SDK_CORE_DIR: &str = "sdk-core";

/// Manifest filename inside the core subdirectory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Archive member holding the manifest
pub const MANIFEST_MEMBER: &str = "sdk-core/manifest.json";

/// Per-version metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub channel: String,
}

impl Manifest {
    /// Parse manifest JSON
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Manifest path for an installed version root
    pub fn path_in(version_root: &Path) -> PathBuf {
        version_root.join(SDK_CORE_DIR).join(MANIFEST_FILE)
    }

    /// Write the manifest atomically into a version root
    pub fn write_to(&self, version_root: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(self)?;
        write_manifest_bytes(version_root, &bytes)
    }
}

/// Atomically place raw manifest bytes into a version root
pub fn write_manifest_bytes(version_root: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;

    let core_dir = version_root.join(SDK_CORE_DIR);
    std::fs::create_dir_all(&core_dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&core_dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(core_dir.join(MANIFEST_FILE))
        .map_err(|e| e.error)?;
    Ok(())
}

/// Outcome of reading a directory's manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestStatus {
    /// Parsed successfully
    Valid(Manifest),
    /// No manifest file: the directory is not an SDK
    Missing,
    /// Manifest exists but could not be read or parsed
    Corrupt(String),
}

impl ManifestStatus {
    /// Read the manifest of a version root
    pub async fn read(version_root: &Path) -> Self {
        let path = Manifest::path_in(version_root);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ManifestStatus::Missing,
            Err(e) => return ManifestStatus::Corrupt(e.to_string()),
        };

        match Manifest::from_slice(&bytes) {
            Ok(manifest) => ManifestStatus::Valid(manifest),
            Err(e) => {
                debug!("Unreadable manifest at {:?}: {}", path, e);
                ManifestStatus::Corrupt(e.to_string())
            }
        }
    }

    pub fn into_manifest(self) -> Option<Manifest> {
        match self {
            ManifestStatus::Valid(manifest) => Some(manifest),
            _ => None,
        }
    }
}
