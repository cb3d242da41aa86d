//! Pebble SDK Management
//!
//! Handles installation and bookkeeping of:
//! - SDK bundles downloaded from the SDK store or read from disk
//! - Native toolchains nested inside installed SDKs
//! - The current SDK pointer
//! - SDKs linked from a local firmware build

pub mod archive;
pub mod catalog;
pub mod current;
pub mod deps;
pub mod downloader;
pub mod error;
pub mod guard;
pub mod installer;
pub mod legacy;
pub mod manager;
pub mod manifest;
pub mod registry;
pub mod requirements;
pub mod toolchain;
pub mod version;

#[cfg(test)]
mod test_support;

pub use catalog::{RemoteCatalog, RemoteSdk};
pub use current::CurrentPointer;
pub use deps::{DependencyInstaller, DependencyPlan, ProcessDependencyInstaller};
pub use downloader::{DownloadError, Downloader, ProgressCallback};
pub use error::{ErrorKind, Result, SdkError};
pub use guard::ArchiveGuard;
pub use installer::Installer;
pub use legacy::{LegacyLinker, LEGACY_SDK_VERSION};
pub use manager::{ManagerConfig, SdkManager, TOOL_COMPONENT};
pub use manifest::{Manifest, ManifestStatus};
pub use registry::Registry;
pub use requirements::{RequirementsChecker, ToolRequirements};
pub use toolchain::{host_platform, ToolchainInstaller};
pub use version::{compare_versions, VersionKey};
