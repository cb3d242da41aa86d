//! Linking a local firmware build as an SDK
//!
//! A firmware checkout that has been built contains everything an SDK needs
//! under `build/sdk`. Instead of copying it, a synthetic `tintin` version is
//! laid out whose platform directories are symlinks into the build tree.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::current::CurrentPointer;
use crate::deps::{self, DependencyInstaller, DependencyPlan};
use crate::error::{Result, SdkError};
use crate::installer::PartialInstall;
use crate::manifest::{Manifest, SDK_CORE_DIR};

/// Version name of a linked build
pub const LEGACY_SDK_VERSION: &str = "tintin";

/// Watch platforms a firmware build produces SDK files for
pub const WATCH_PLATFORMS: &[&str] = &["aplite", "basalt", "chalk", "diorite", "emery"];

/// File marking the root of a firmware checkout
const BUILD_SCRIPT: &str = "wscript";

const EMULATOR_IMAGES: &[&str] = &["qemu_micro_flash.bin", "qemu_spi_flash.bin"];

/// Builds the synthetic legacy SDK entry
pub struct LegacyLinker<'a> {
    root: PathBuf,
    current: &'a CurrentPointer,
    deps: &'a dyn DependencyInstaller,
}

impl<'a> LegacyLinker<'a> {
    pub fn new(root: &Path, current: &'a CurrentPointer, deps: &'a dyn DependencyInstaller) -> Self {
        Self {
            root: root.to_path_buf(),
            current,
            deps,
        }
    }

    /// Link the build at `checkout` and make it current
    pub async fn link(&self, checkout: &Path) -> Result<PathBuf> {
        let checkout = tokio::fs::canonicalize(checkout)
            .await
            .map_err(|_| SdkError::InvalidLegacyBuild(checkout.to_path_buf()))?;
        if !tokio::fs::try_exists(checkout.join(BUILD_SCRIPT)).await? {
            return Err(SdkError::InvalidLegacyBuild(checkout));
        }

        let dest = self.root.join(LEGACY_SDK_VERSION);
        tokio::fs::create_dir_all(&self.root).await?;
        match tokio::fs::create_dir(&dest).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(SdkError::AlreadyInstalled(LEGACY_SDK_VERSION.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let partial = PartialInstall::claim(&dest, self.current);
        self.populate(&checkout, &dest).await?;
        self.current.set(LEGACY_SDK_VERSION).await?;
        partial.commit();

        info!("Generated an SDK linked to {:?}", checkout);
        Ok(dest)
    }

    async fn populate(&self, checkout: &Path, dest: &Path) -> Result<()> {
        let build = checkout.join("build");
        let sdk = build.join("sdk");

        let js_root = deps::prepare_js_root(&sdk, dest).await?;

        let pebble = dest.join(SDK_CORE_DIR).join("pebble");
        tokio::fs::create_dir_all(&pebble).await?;
        write_waf_launcher(&pebble.join("waf"), &sdk.join("waf")).await?;

        for platform in WATCH_PLATFORMS {
            let platform_dir = pebble.join(platform);
            tokio::fs::create_dir(&platform_dir).await?;
            symlink_dir(&sdk.join(platform).join("include"), &platform_dir.join("include")).await?;
            symlink_dir(&sdk.join(platform).join("lib"), &platform_dir.join("lib")).await?;

            let qemu = platform_dir.join("qemu");
            tokio::fs::create_dir(&qemu).await?;
            for image in EMULATOR_IMAGES {
                symlink_file(&build.join(image), &qemu.join(image)).await?;
            }
        }
        symlink_dir(&sdk.join("common"), &pebble.join("common")).await?;

        let plan = DependencyPlan {
            env_root: dest.to_path_buf(),
            requirements: checkout.join("requirements.txt"),
            working_dir: Some(checkout.to_path_buf()),
            js_root,
        };
        self.deps.install(&plan).await?;

        legacy_manifest().write_to(dest)
    }
}

fn legacy_manifest() -> Manifest {
    Manifest {
        version: LEGACY_SDK_VERSION.to_string(),
        requirements: Vec::new(),
        kind: "sdk-core".to_string(),
        channel: String::new(),
    }
}

/// `waf` must run under the SDK's interpreter, so a script stands in for a link
async fn write_waf_launcher(path: &Path, waf: &Path) -> Result<()> {
    let script = format!(
        "#!/usr/bin/env python\nimport subprocess\nimport sys\nsubprocess.call([sys.executable, {:?}] + sys.argv[1:])\n",
        waf.to_string_lossy()
    );
    tokio::fs::write(path, script).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(())
}

async fn symlink_dir(target: &Path, link: &Path) -> Result<()> {
    debug!("Linking {:?} -> {:?}", link, target);
    #[cfg(unix)]
    tokio::fs::symlink(target, link).await?;
    #[cfg(windows)]
    tokio::fs::symlink_dir(target, link).await?;
    Ok(())
}

async fn symlink_file(target: &Path, link: &Path) -> Result<()> {
    debug!("Linking {:?} -> {:?}", link, target);
    #[cfg(unix)]
    tokio::fs::symlink(target, link).await?;
    #[cfg(windows)]
    tokio::fs::symlink_file(target, link).await?;
    Ok(())
}
