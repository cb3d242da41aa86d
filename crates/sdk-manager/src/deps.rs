//! Post-install dependency setup
//!
//! Every SDK gets its own Python virtualenv with the SDK's requirements
//! installed, plus a `node_modules` tree when it ships a `package.json`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, debug};

use crate::error::{Result, SdkError};

/// Virtualenv directory name inside a version root
pub const VENV_DIR: &str = ".venv";

const PACKAGE_JSON: &str = "package.json";
const NODE_MODULES_DIR: &str = "node_modules";

/// Stage `package.json` into `env_root` for npm.
///
/// Copies the descriptor next to a fresh `node_modules` directory and returns
/// the directory npm should run in, or `None` when there is no descriptor.
pub async fn prepare_js_root(source_dir: &Path, env_root: &Path) -> Result<Option<PathBuf>> {
    let package_json = source_dir.join(PACKAGE_JSON);
    if !tokio::fs::try_exists(&package_json).await? {
        return Ok(None);
    }

    tokio::fs::create_dir(env_root.join(NODE_MODULES_DIR)).await?;
    tokio::fs::copy(&package_json, env_root.join(PACKAGE_JSON)).await?;
    debug!("Staged {:?} into {:?}", package_json, env_root);
    Ok(Some(env_root.to_path_buf()))
}

/// What to install for one SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyPlan {
    /// Version root; the virtualenv is created inside it
    pub env_root: PathBuf,
    /// pip requirements file
    pub requirements: PathBuf,
    /// Working directory for pip, if it matters
    pub working_dir: Option<PathBuf>,
    /// Directory holding `package.json` to run npm in
    pub js_root: Option<PathBuf>,
}

impl DependencyPlan {
    pub fn venv_path(&self) -> PathBuf {
        self.env_root.join(VENV_DIR)
    }
}

/// Installs an SDK's dependencies
#[async_trait]
pub trait DependencyInstaller: Send + Sync {
    async fn install(&self, plan: &DependencyPlan) -> Result<()>;
}

/// Installs dependencies by running python/pip/npm
#[derive(Debug, Clone)]
pub struct ProcessDependencyInstaller {
    python: PathBuf,
    npm: PathBuf,
}

impl ProcessDependencyInstaller {
    pub fn new(python: PathBuf, npm: PathBuf) -> Self {
        Self { python, npm }
    }

    /// Interpreter inside a virtualenv
    fn venv_python(venv: &Path) -> PathBuf {
        if cfg!(windows) {
            venv.join("Scripts").join("python.exe")
        } else {
            venv.join("bin").join("python")
        }
    }

    /// Run a tool; dropping the returned future kills it
    async fn run(mut cmd: Command, what: &str) -> Result<()> {
        cmd.kill_on_drop(true);
        debug!("Running {:?}", cmd);
        let output = cmd
            .output()
            .await
            .map_err(|e| SdkError::PostInstall(format!("{}: {}", what, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SdkError::PostInstall(format!(
                "{} exited with {:?}: {}",
                what,
                output.status.code(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DependencyInstaller for ProcessDependencyInstaller {
    async fn install(&self, plan: &DependencyPlan) -> Result<()> {
        let venv = plan.venv_path();

        info!("Preparing virtualenv... (this may take a while)");
        let mut cmd = Command::new(&self.python);
        cmd.arg("-m").arg("venv").arg(&venv);
        Self::run(cmd, "creating virtualenv").await?;

        info!("Installing dependencies...");
        let mut cmd = Command::new(Self::venv_python(&venv));
        cmd.args(["-m", "pip", "install", "-r"]).arg(&plan.requirements);
        if let Some(dir) = &plan.working_dir {
            cmd.current_dir(dir);
        }
        Self::run(cmd, "pip install").await?;

        if let Some(js_root) = &plan.js_root {
            info!("Installing JS dependencies... (this may take a while)");
            let mut cmd = Command::new(&self.npm);
            cmd.args(["install", "--silent"]).current_dir(js_root);
            Self::run(cmd, "npm install").await?;
        }

        Ok(())
    }
}
