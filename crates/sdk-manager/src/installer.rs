//! SDK bundle installation
//!
//! An install runs download, validate, extract, post-install, activate and
//! toolchain in that order. The destination directory is claimed with an
//! exclusive `create_dir`; from then on a [`PartialInstall`] guard owns it and
//! removes it again unless the whole pipeline finishes. The guard also runs
//! when the install future is dropped, so an interrupted install is cleaned
//! up the same way as a failed one. Before removing anything it cancels the
//! extraction and waits for it to stop writing; dependency tools are killed
//! with their future.
//!
//! The manifest member is held back during extraction and written last, so a
//! version only shows up in the registry once it is complete.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive::{self, CancelToken, SdkArchive};
use crate::catalog::RemoteCatalog;
use crate::current::CurrentPointer;
use crate::deps::{self, DependencyInstaller, DependencyPlan};
use crate::downloader::{Downloader, ProgressCallback};
use crate::error::{Result, SdkError};
use crate::guard::ArchiveGuard;
use crate::manifest::{self, Manifest, MANIFEST_MEMBER, SDK_CORE_DIR};
use crate::registry::Registry;
use crate::requirements::RequirementsChecker;
use crate::toolchain::ToolchainInstaller;

const REQUIREMENTS_FILE: &str = "requirements.txt";

const LICENSE_NOTICE: &str = "\
By using the Pebble SDK, you agree to the following:

PEBBLE TERMS OF USE
https://developer.rebble.io/developer.getpebble.com/legal/terms-of-use/index.html

PEBBLE DEVELOPER LICENSE
https://developer.rebble.io/developer.getpebble.com/legal/sdk-license/index.html";

/// Removes a claimed destination unless the install is committed
pub(crate) struct PartialInstall {
    path: PathBuf,
    pointer: CurrentPointer,
    /// Pointer target before this install moved it, once it has
    previous: Option<Option<String>>,
    cancel: CancelToken,
    committed: bool,
}

impl PartialInstall {
    pub(crate) fn claim(path: &Path, pointer: &CurrentPointer) -> Self {
        Self {
            path: path.to_path_buf(),
            pointer: pointer.clone(),
            previous: None,
            cancel: CancelToken::default(),
            committed: false,
        }
    }

    /// Token for work writing into the claimed directory
    pub(crate) fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn pointer_moved(&mut self, previous: Option<String>) {
        self.previous = Some(previous);
    }

    pub(crate) fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialInstall {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.cancel.cancel();

        if let Some(previous) = &self.previous {
            if let Err(e) = self.pointer.restore_blocking(previous.as_deref()) {
                warn!("Failed to restore current SDK pointer: {}", e);
            }
        }

        info!("Cleaning up failed install...");
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Cleanup of {:?} failed: {}", self.path, e),
        }
    }
}

/// Installs and removes SDK versions under one root
pub struct Installer {
    registry: Registry,
    guard: ArchiveGuard,
    downloader: Downloader,
    catalog: RemoteCatalog,
    toolchains: ToolchainInstaller,
    requirements: Arc<dyn RequirementsChecker>,
    deps: Arc<dyn DependencyInstaller>,
    /// Host platform to fetch a toolchain for; `None` skips the toolchain
    toolchain_platform: Option<String>,
}

impl Installer {
    pub fn new(
        root: &Path,
        downloader: Downloader,
        catalog: RemoteCatalog,
        requirements: Arc<dyn RequirementsChecker>,
        deps: Arc<dyn DependencyInstaller>,
    ) -> Self {
        Self {
            registry: Registry::new(root),
            guard: ArchiveGuard::new(root),
            toolchains: ToolchainInstaller::new(root, downloader.clone()),
            downloader,
            catalog,
            requirements,
            deps,
            toolchain_platform: None,
        }
    }

    /// Install the matching toolchain for `platform` after each SDK
    pub fn with_toolchain(mut self, platform: impl Into<String>) -> Self {
        self.toolchain_platform = Some(platform.into());
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn toolchains(&self) -> &ToolchainInstaller {
        &self.toolchains
    }

    /// Look a version up in the catalog and install it
    pub async fn install_remote(
        &self,
        version: &str,
        channel: &str,
        progress: Option<&ProgressCallback>,
    ) -> Result<String> {
        let sdk = self.catalog.fetch(version, channel).await?;
        let (Some(found), Some(url)) = (sdk.version.as_deref(), sdk.url.as_deref()) else {
            return Err(SdkError::NotFound(version.to_string()));
        };

        let dest = self.guard.destination(found)?;
        if tokio::fs::try_exists(&dest).await? {
            return Err(SdkError::AlreadyInstalled(found.to_string()));
        }
        self.requirements.ensure_satisfied(&sdk.requirements)?;

        info!("{}", LICENSE_NOTICE);
        self.install_from_url(url, progress).await
    }

    /// Download a bundle and install it
    pub async fn install_from_url(
        &self,
        url: &str,
        progress: Option<&ProgressCallback>,
    ) -> Result<String> {
        let file = self.downloader.download_to_temp(url, progress).await?;
        self.install_from_file(file, progress).await
    }

    /// Install a bundle from a local archive
    pub async fn install_from_path(
        &self,
        path: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<String> {
        let file = File::open(path)?;
        self.install_from_file(file, progress).await
    }

    /// Install a bundle from an open archive; returns the installed version.
    ///
    /// `progress` is only used for the toolchain download.
    pub async fn install_from_file(
        &self,
        file: File,
        progress: Option<&ProgressCallback>,
    ) -> Result<String> {
        info!("Extracting...");
        let (archive, index) = archive::blocking(move || {
            let mut archive = SdkArchive::new(file);
            let index = archive.index(Some(MANIFEST_MEMBER))?;
            Ok((archive, index))
        })
        .await?;

        let manifest_bytes = index
            .wanted
            .ok_or_else(|| SdkError::Archive(format!("no {} in bundle", MANIFEST_MEMBER)))?;
        let manifest = Manifest::from_slice(&manifest_bytes)?;
        let version = manifest.version.clone();

        let dest = self.guard.destination(&version)?;
        if tokio::fs::try_exists(&dest).await? {
            return Err(SdkError::AlreadyInstalled(version));
        }
        ArchiveGuard::check_members(&index.members)?;
        self.requirements.ensure_satisfied(&manifest.requirements)?;

        tokio::fs::create_dir_all(self.guard.root()).await?;
        match tokio::fs::create_dir(&dest).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(SdkError::AlreadyInstalled(version));
            }
            Err(e) => return Err(e.into()),
        }
        let mut partial = PartialInstall::claim(&dest, self.registry.current());

        let extract_to = dest.clone();
        let cancel = partial.cancel_token();
        archive::blocking(move || {
            let mut archive = archive;
            archive.extract_into(&extract_to, &[MANIFEST_MEMBER], &cancel)
        })
        .await?;

        self.post_install(&dest).await?;
        manifest::write_manifest_bytes(&dest, &manifest_bytes)?;

        let previous = self.registry.current().target().await?;
        partial.pointer_moved(previous);
        self.registry.current().set(&version).await?;

        if let Some(platform) = &self.toolchain_platform {
            let url = self.catalog.toolchain_url(&version, platform)?;
            self.toolchains
                .install_from_url(&url, &version, platform, progress)
                .await?;
        }

        partial.commit();
        info!("Installed SDK {}", version);
        Ok(version)
    }

    async fn post_install(&self, dest: &Path) -> Result<()> {
        let core = dest.join(SDK_CORE_DIR);
        let plan = DependencyPlan {
            env_root: dest.to_path_buf(),
            requirements: core.join(REQUIREMENTS_FILE),
            working_dir: None,
            js_root: deps::prepare_js_root(&core, dest).await?,
        };
        self.deps.install(&plan).await
    }

    /// Remove an installed version and repair the current pointer.
    ///
    /// Returns the pointer's target afterwards.
    pub async fn uninstall(&self, version: &str) -> Result<Option<String>> {
        let path = self.registry.root_path_for_sdk(version)?;
        tokio::fs::remove_dir_all(&path).await?;
        info!("Removed SDK {}", version);

        let remaining = self.registry.list_local_versions().await?;
        self.registry.current().on_uninstall(version, &remaining).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::requirements::ToolRequirements;
    use crate::test_support::{install_fixture, ArchiveBuilder, RecordingDeps};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn installer_with(root: &Path, server: &str, deps: Arc<RecordingDeps>) -> Installer {
        let downloader = Downloader::new(10).unwrap();
        Installer::new(
            root,
            downloader.clone(),
            RemoteCatalog::new(server, downloader),
            Arc::new(ToolRequirements::new("pebble-tool", "4.5")),
            deps,
        )
    }

    fn installer(root: &Path) -> (Installer, Arc<RecordingDeps>) {
        let deps = Arc::new(RecordingDeps::default());
        (installer_with(root, "http://127.0.0.1:9", deps.clone()), deps)
    }

    fn bundle_requiring(version: &str, requirement: &str) -> File {
        ArchiveBuilder::new()
            .file(
                "sdk-core/manifest.json",
                format!(
                    r#"{{"version": "{}", "requirements": ["{}"], "type": "sdk-core"}}"#,
                    version, requirement
                )
                .as_bytes(),
            )
            .file("sdk-core/requirements.txt", b"pyyaml\n")
            .gzip()
            .build()
    }

    fn toolchain_bytes(platform: &str) -> Vec<u8> {
        ArchiveBuilder::new()
            .file(&format!("toolchain-{}/arm-none-eabi/bin/gcc", platform), b"ELF")
            .gzip()
            .build_bytes()
    }

    #[tokio::test]
    async fn test_install_and_uninstall_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let (installer, deps) = installer(root.path());

        let version = installer
            .install_from_file(ArchiveBuilder::sdk("4.3").build(), None)
            .await
            .unwrap();
        assert_eq!(version, "4.3");

        let dest = root.path().join("4.3");
        assert!(dest.join("sdk-core/pebble/waf").exists());
        assert!(Manifest::path_in(&dest).exists());
        assert_eq!(installer.registry().get_current().await.as_deref(), Some("4.3"));

        let plans = deps.plans();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].env_root, dest);
        assert_eq!(plans[0].requirements, dest.join("sdk-core/requirements.txt"));
        assert_eq!(plans[0].js_root, None);

        let listed = installer.registry().list_local().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].version, "4.3");

        let next = installer.uninstall("4.3").await.unwrap();
        assert_eq!(next, None);
        assert!(!dest.exists());
        assert!(installer.registry().list_local().await.unwrap().is_empty());
        assert_eq!(installer.registry().get_current().await, None);
    }

    #[tokio::test]
    async fn test_package_json_gets_node_modules() {
        let root = tempfile::tempdir().unwrap();
        let (installer, deps) = installer(root.path());
        let bundle = ArchiveBuilder::sdk("4.3")
            .file("sdk-core/package.json", br#"{"dependencies": {}}"#)
            .build();

        installer.install_from_file(bundle, None).await.unwrap();

        let dest = root.path().join("4.3");
        assert!(dest.join("node_modules").is_dir());
        assert!(dest.join("package.json").exists());
        assert_eq!(deps.plans()[0].js_root.as_deref(), Some(dest.as_path()));
    }

    #[tokio::test]
    async fn test_absolute_member_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let (installer, deps) = installer(root.path());
        let bundle = ArchiveBuilder::sdk("4.3").file("/etc/passwd", b"root:x:0:0").build();

        let err = installer.install_from_file(bundle, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SecurityViolation);
        assert!(err.to_string().contains("/etc/passwd"));
        assert!(!root.path().join("4.3").exists());
        assert!(deps.plans().is_empty());
    }

    #[tokio::test]
    async fn test_traversal_member_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let (installer, _) = installer(root.path());
        let bundle = ArchiveBuilder::sdk("4.3").file("../../x", b"boom").build();

        let err = installer.install_from_file(bundle, None).await.unwrap_err();
        assert!(matches!(err, SdkError::QuestionableFile(ref n) if n == "../../x"));
        assert!(!root.path().join("4.3").exists());
    }

    #[tokio::test]
    async fn test_suspicious_version_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let (installer, _) = installer(root.path());

        let err = installer
            .install_from_file(ArchiveBuilder::sdk("../escape").build(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::SuspiciousVersion(_)));
        assert!(!root.path().parent().unwrap().join("escape").exists());
    }

    #[tokio::test]
    async fn test_conflict_leaves_existing_install_untouched() {
        let root = tempfile::tempdir().unwrap();
        install_fixture(root.path(), "4.3");
        let marker = root.path().join("4.3/sdk-core/marker");
        std::fs::write(&marker, b"original").unwrap();
        let manifest_before = std::fs::read(Manifest::path_in(&root.path().join("4.3"))).unwrap();
        let (installer, deps) = installer(root.path());

        let err = installer
            .install_from_file(ArchiveBuilder::sdk("4.3").build(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::AlreadyInstalled(ref v) if v == "4.3"));
        assert_eq!(err.kind(), ErrorKind::InstallConflict);
        assert_eq!(std::fs::read(&marker).unwrap(), b"original");
        assert_eq!(
            std::fs::read(Manifest::path_in(&root.path().join("4.3"))).unwrap(),
            manifest_before
        );
        assert!(!root.path().join("4.3/sdk-core/pebble").exists());
        assert!(deps.plans().is_empty());
    }

    #[tokio::test]
    async fn test_unmet_requirements_create_nothing() {
        let root = tempfile::tempdir().unwrap();
        let (installer, _) = installer(root.path());

        let err = installer
            .install_from_file(bundle_requiring("5.0", "pebble-tool>=5.0"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnmetRequirements);
        assert!(!root.path().join("5.0").exists());
    }

    #[tokio::test]
    async fn test_met_requirements_install() {
        let root = tempfile::tempdir().unwrap();
        let (installer, _) = installer(root.path());

        installer
            .install_from_file(bundle_requiring("4.4", "pebble-tool>=4.2"), None)
            .await
            .unwrap();
        assert!(root.path().join("4.4").is_dir());
    }

    #[tokio::test]
    async fn test_post_install_failure_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        install_fixture(root.path(), "4.2");
        let deps = Arc::new(RecordingDeps::failing());
        let installer = installer_with(root.path(), "http://127.0.0.1:9", deps);
        installer.registry().current().set("4.2").await.unwrap();

        let err = installer
            .install_from_file(ArchiveBuilder::sdk("4.3").build(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::PostInstall(_)));
        assert!(!root.path().join("4.3").exists());
        assert_eq!(installer.registry().get_current().await.as_deref(), Some("4.2"));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_an_archive_error() {
        let root = tempfile::tempdir().unwrap();
        let (installer, _) = installer(root.path());
        let bundle = ArchiveBuilder::new().file("sdk-core/requirements.txt", b"").build();

        let err = installer.install_from_file(bundle, None).await.unwrap_err();
        assert!(matches!(err, SdkError::Archive(_)));
    }

    #[tokio::test]
    async fn test_uninstall_current_selects_highest_remaining() {
        let root = tempfile::tempdir().unwrap();
        let (installer, _) = installer(root.path());
        for version in ["1.5.0", "2.0.0", "3.0.0"] {
            installer
                .install_from_file(ArchiveBuilder::sdk(version).build(), None)
                .await
                .unwrap();
        }
        assert_eq!(installer.registry().get_current().await.as_deref(), Some("3.0.0"));

        let next = installer.uninstall("3.0.0").await.unwrap();
        assert_eq!(next.as_deref(), Some("2.0.0"));
        assert_eq!(installer.registry().get_current().await.as_deref(), Some("2.0.0"));
    }

    #[tokio::test]
    async fn test_uninstall_missing_version() {
        let root = tempfile::tempdir().unwrap();
        let (installer, _) = installer(root.path());
        let err = installer.uninstall("4.3").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingSdk);
    }

    #[test]
    fn test_dropped_partial_install_is_removed() {
        let root = tempfile::tempdir().unwrap();
        install_fixture(root.path(), "4.2");
        let pointer = CurrentPointer::new(root.path());
        let dest = root.path().join("4.3");
        std::fs::create_dir_all(dest.join("sdk-core")).unwrap();

        let mut partial = PartialInstall::claim(&dest, &pointer);
        let cancel = partial.cancel_token();
        partial.pointer_moved(Some("4.2".into()));
        std::fs::write(pointer.path(), "4.3\n").unwrap();
        drop(partial);

        assert!(cancel.is_cancelled());
        assert!(!dest.exists());
        assert_eq!(std::fs::read_to_string(pointer.path()).unwrap().trim(), "4.2");
    }

    #[test]
    fn test_committed_partial_install_is_kept() {
        let root = tempfile::tempdir().unwrap();
        let pointer = CurrentPointer::new(root.path());
        let dest = root.path().join("4.3");
        std::fs::create_dir(&dest).unwrap();

        let partial = PartialInstall::claim(&dest, &pointer);
        let cancel = partial.cancel_token();
        partial.commit();
        assert!(dest.exists());
        assert!(!cancel.is_cancelled());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interrupted_install_leaves_nothing_behind() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        use crate::deps::ProcessDependencyInstaller;

        // Stands in for python: `-m venv <dir>` writes into the venv after a delay
        let tools = tempfile::tempdir().unwrap();
        let python = tools.path().join("python");
        std::fs::write(&python, "#!/bin/sh\nsleep 1\nmkdir -p \"$3/lib\"\n").unwrap();
        std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755)).unwrap();

        let root = tempfile::tempdir().unwrap();
        let downloader = Downloader::new(10).unwrap();
        let slow = Installer::new(
            root.path(),
            downloader.clone(),
            RemoteCatalog::new("http://127.0.0.1:9", downloader),
            Arc::new(ToolRequirements::new("pebble-tool", "4.5")),
            Arc::new(ProcessDependencyInstaller::new(python, PathBuf::from("npm"))),
        );

        let interrupted = tokio::time::timeout(
            Duration::from_millis(300),
            slow.install_from_file(ArchiveBuilder::sdk("4.3").build(), None),
        )
        .await;
        assert!(interrupted.is_err());
        assert!(!root.path().join("4.3").exists());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!root.path().join("4.3").exists());

        let (installer, _) = installer(root.path());
        assert!(installer.registry().list_local().await.unwrap().is_empty());
        let version = installer
            .install_from_file(ArchiveBuilder::sdk("4.3").build(), None)
            .await
            .unwrap();
        assert_eq!(version, "4.3");
    }

    #[tokio::test]
    async fn test_remote_install_with_toolchain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/files/sdk-core/4.3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "version": "4.3",
                "url": format!("{}/sdk-core-4.3.tar.gz", server.uri()),
                "requirements": [],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sdk-core-4.3.tar.gz"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(ArchiveBuilder::sdk("4.3").build_bytes()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/releases/4.3/toolchain-linux.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(toolchain_bytes("linux")))
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let deps = Arc::new(RecordingDeps::default());
        let installer = installer_with(root.path(), &server.uri(), deps).with_toolchain("linux");

        let version = installer.install_remote("4.3", "", None).await.unwrap();
        assert_eq!(version, "4.3");
        assert!(root.path().join("4.3/toolchain/arm-none-eabi/bin/gcc").exists());
        assert_eq!(installer.registry().get_current().await.as_deref(), Some("4.3"));

        let err = installer.install_remote("4.3", "", None).await.unwrap_err();
        assert!(matches!(err, SdkError::AlreadyInstalled(_)));
    }

    #[tokio::test]
    async fn test_remote_unknown_version_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/files/sdk-core/9.9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let installer = installer_with(root.path(), &server.uri(), Arc::new(RecordingDeps::default()));

        let err = installer.install_remote("9.9", "", None).await.unwrap_err();
        assert!(matches!(err, SdkError::NotFound(ref v) if v == "9.9"));
        assert!(std::fs::read_dir(root.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_toolchain_failure_rolls_back_install_and_pointer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases/4.3/toolchain-linux.tar.gz"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        install_fixture(root.path(), "4.2");
        let installer = installer_with(root.path(), &server.uri(), Arc::new(RecordingDeps::default()))
            .with_toolchain("linux");
        installer.registry().current().set("4.2").await.unwrap();

        let err = installer
            .install_from_file(ArchiveBuilder::sdk("4.3").build(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!root.path().join("4.3").exists());
        assert_eq!(installer.registry().get_current().await.as_deref(), Some("4.2"));
    }
}
