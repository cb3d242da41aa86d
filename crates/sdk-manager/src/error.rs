//! SDK manager errors

use std::path::PathBuf;

use crate::downloader::DownloadError;

/// Failure categories surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InstallConflict,
    SecurityViolation,
    UnmetRequirements,
    MissingSdk,
    Transport,
    Other,
}

/// SDK manager errors
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("SDK {0} is already installed.")]
    AlreadyInstalled(String),
    #[error("Toolchain for SDK {0} is already installed.")]
    ToolchainInstalled(String),
    #[error("SDK contained a questionable file: {0}")]
    QuestionableFile(String),
    #[error("Suspicious version number: {0}")]
    SuspiciousVersion(String),
    #[error("Unmet requirements: {0}")]
    UnmetRequirements(String),
    #[error("SDK {0} is not installed.")]
    MissingSdk(String),
    #[error("SDK {0} could not be downloaded.")]
    NotFound(String),
    #[error(transparent)]
    Transport(#[from] DownloadError),
    #[error("Invalid archive: {0}")]
    Archive(String),
    #[error("Dependency installation failed: {0}")]
    PostInstall(String),
    #[error("No legacy build found at {0:?}")]
    InvalidLegacyBuild(PathBuf),
    #[error("Toolchain layout error: {0}")]
    Toolchain(String),
    #[error("Installation was interrupted.")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SdkError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SdkError::AlreadyInstalled(_) | SdkError::ToolchainInstalled(_) => ErrorKind::InstallConflict,
            SdkError::QuestionableFile(_) | SdkError::SuspiciousVersion(_) => ErrorKind::SecurityViolation,
            SdkError::UnmetRequirements(_) => ErrorKind::UnmetRequirements,
            SdkError::MissingSdk(_) => ErrorKind::MissingSdk,
            SdkError::Transport(_) => ErrorKind::Transport,
            _ => ErrorKind::Other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
