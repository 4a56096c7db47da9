//! uv: interpreter provisioning, virtual environments and package installs

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::pip::{
    InstallOptions, InstalledPackage, PackageManager, parse_freeze, parse_list_json, spec_args,
};
use crate::runner::{ToolCommand, ToolOutput};
use crate::timeouts::{INTROSPECTION_TIMEOUT, QUICK_TIMEOUT, VENV_TIMEOUT};

/// Wrapper around the `uv` executable.
///
/// Cache and interpreter-install directories are passed to every invocation
/// explicitly rather than read from the ambient environment.
#[derive(Debug, Clone)]
pub struct UvTool {
    binary: PathBuf,
    cache_dir: Option<PathBuf>,
    python_install_dir: Option<PathBuf>,
}

impl Default for UvTool {
    fn default() -> Self {
        Self::new("uv")
    }
}

impl UvTool {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            cache_dir: None,
            python_install_dir: None,
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_python_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.python_install_dir = Some(dir.into());
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.binary);
        if let Some(dir) = &self.cache_dir {
            cmd = cmd.env("UV_CACHE_DIR", dir);
        }
        if let Some(dir) = &self.python_install_dir {
            cmd = cmd.env("UV_PYTHON_INSTALL_DIR", dir);
        }
        cmd
    }

    /// `uv --version`; doubles as an availability probe.
    pub async fn version(&self) -> Result<String> {
        let out = self
            .command()
            .arg("--version")
            .timeout(QUICK_TIMEOUT)
            .run()
            .await?;
        Ok(out.stdout.trim().to_string())
    }

    /// Make an interpreter of `version` available to uv.
    pub async fn python_install(&self, version: &str) -> Result<()> {
        tracing::info!(version, "installing interpreter");
        self.command()
            .args(["python", "install", version])
            .timeout(VENV_TIMEOUT)
            .run()
            .await?;
        Ok(())
    }

    /// Create a virtual environment at `path`.
    pub async fn venv(&self, path: &Path, python_version: &str) -> Result<()> {
        let mut cmd = self.command().arg("venv");
        if let Some(request) = resolve_python_arg(python_version) {
            cmd = cmd.args(["--python", &request]);
        }
        tracing::info!(path = %path.display(), python_version, "creating virtual environment");
        cmd.arg(path).timeout(VENV_TIMEOUT).run().await?;
        Ok(())
    }

    fn pip(&self, subcommand: &str, python: &Path) -> ToolCommand {
        self.command()
            .args(["pip", subcommand, "--python"])
            .arg(python)
    }
}

/// Interpreter request to forward as `--python`.
///
/// A single version (`3.11.5`, `>=3.10`) is forwarded; a range such as
/// `>=3.10,<3.13` is left to uv's own discovery.
fn resolve_python_arg(version: &str) -> Option<String> {
    let trimmed = version.trim();
    let specifiers = trimmed.split(',').filter(|s| !s.trim().is_empty()).count();
    (specifiers == 1).then(|| trimmed.to_string())
}

#[async_trait]
impl PackageManager for UvTool {
    fn name(&self) -> &str {
        "uv"
    }

    async fn install(
        &self,
        python: &Path,
        specs: &[String],
        options: &InstallOptions,
    ) -> Result<ToolOutput> {
        let mut cmd = self.pip("install", python).timeout(options.timeout);
        if let Some(index) = &options.index_url {
            cmd = cmd.args(["--index-url", index]);
        }
        if options.prerelease {
            cmd = cmd.arg("--prerelease=allow");
        }
        cmd.args(spec_args(specs, options.editable)).run().await
    }

    async fn list_installed(&self, python: &Path) -> Result<Vec<InstalledPackage>> {
        let out = self
            .pip("list", python)
            .args(["--format", "json"])
            .timeout(INTROSPECTION_TIMEOUT)
            .run()
            .await?;
        parse_list_json("uv", &out.stdout)
    }

    async fn freeze(&self, python: &Path) -> Result<Vec<String>> {
        let out = self
            .pip("freeze", python)
            .timeout(INTROSPECTION_TIMEOUT)
            .run()
            .await?;
        Ok(parse_freeze(&out.stdout))
    }
}
