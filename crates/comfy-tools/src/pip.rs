//! Package-installer seam
//!
//! [`PackageManager`] is what the installers program against. The real
//! implementations are [`UvTool`](crate::uv::UvTool) and [`PipTool`]; tests
//! substitute a recording mock.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::runner::{ToolCommand, ToolOutput};
use crate::timeouts::{INTROSPECTION_TIMEOUT, PACKAGE_INSTALL_TIMEOUT};

/// Per-invocation install flags.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Replaces the default package index (used for accelerator wheels).
    pub index_url: Option<String>,
    /// Allow pre-release versions to satisfy the request.
    pub prerelease: bool,
    /// Install every spec in editable mode (`-e`).
    pub editable: bool,
    pub timeout: Duration,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            index_url: None,
            prerelease: false,
            editable: false,
            timeout: PACKAGE_INSTALL_TIMEOUT,
        }
    }
}

impl InstallOptions {
    pub fn with_index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = Some(url.into());
        self
    }

    pub fn with_prerelease(mut self, prerelease: bool) -> Self {
        self.prerelease = prerelease;
        self
    }

    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One row of `pip list --format json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub editable_project_location: Option<String>,
}

impl InstalledPackage {
    pub fn is_editable(&self) -> bool {
        self.editable_project_location.is_some()
    }
}

/// Operations the pipeline needs from a Python package installer.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Install `specs` (requirement strings, paths or URLs) into the
    /// environment owning `python`. A non-zero exit is an error.
    async fn install(
        &self,
        python: &Path,
        specs: &[String],
        options: &InstallOptions,
    ) -> Result<ToolOutput>;

    async fn list_installed(&self, python: &Path) -> Result<Vec<InstalledPackage>>;

    /// `pip freeze` lines, used to recover VCS and editable sources.
    async fn freeze(&self, python: &Path) -> Result<Vec<String>>;

    /// Install a requirements file.
    async fn install_requirements(
        &self,
        python: &Path,
        requirements: &Path,
        options: &InstallOptions,
    ) -> Result<ToolOutput> {
        let specs = vec!["-r".to_string(), requirements.display().to_string()];
        self.install(python, &specs, options).await
    }
}

/// Expand specs into installer arguments, prefixing each with `-e` when the
/// install is editable.
pub(crate) fn spec_args(specs: &[String], editable: bool) -> Vec<String> {
    if !editable {
        return specs.to_vec();
    }
    specs
        .iter()
        .flat_map(|spec| ["-e".to_string(), spec.clone()])
        .collect()
}

pub(crate) fn parse_list_json(program: &str, stdout: &str) -> Result<Vec<InstalledPackage>> {
    serde_json::from_str(stdout.trim()).map_err(|e| Error::UnexpectedOutput {
        program: program.to_string(),
        output: format!("package list is not valid JSON: {e}"),
    })
}

pub(crate) fn parse_freeze(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// `python -m pip`, for environments where uv is unavailable.
#[derive(Debug, Clone, Default)]
pub struct PipTool;

impl PipTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PackageManager for PipTool {
    fn name(&self) -> &str {
        "pip"
    }

    async fn install(
        &self,
        python: &Path,
        specs: &[String],
        options: &InstallOptions,
    ) -> Result<ToolOutput> {
        let mut cmd = ToolCommand::new(python)
            .args(["-m", "pip", "install", "--disable-pip-version-check"])
            .timeout(options.timeout);
        if let Some(index) = &options.index_url {
            cmd = cmd.args(["--index-url", index]);
        }
        if options.prerelease {
            cmd = cmd.arg("--pre");
        }
        cmd.args(spec_args(specs, options.editable)).run().await
    }

    async fn list_installed(&self, python: &Path) -> Result<Vec<InstalledPackage>> {
        let out = ToolCommand::new(python)
            .args(["-m", "pip", "list", "--format", "json", "--disable-pip-version-check"])
            .timeout(INTROSPECTION_TIMEOUT)
            .run()
            .await?;
        parse_list_json("pip", &out.stdout)
    }

    async fn freeze(&self, python: &Path) -> Result<Vec<String>> {
        let out = ToolCommand::new(python)
            .args(["-m", "pip", "freeze", "--disable-pip-version-check"])
            .timeout(INTROSPECTION_TIMEOUT)
            .run()
            .await?;
        Ok(parse_freeze(&out.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn editable_specs_are_prefixed() {
        let specs = vec!["./a".to_string(), "./b".to_string()];
        assert_eq!(spec_args(&specs, true), vec!["-e", "./a", "-e", "./b"]);
        assert_eq!(spec_args(&specs, false), vec!["./a", "./b"]);
    }

    #[test]
    fn parses_pip_list_json() {
        let json = r#"[
            {"name": "numpy", "version": "1.26.0"},
            {"name": "mylib", "version": "0.1.0", "editable_project_location": "/src/mylib"}
        ]"#;
        let pkgs = parse_list_json("pip", json).unwrap();
        assert_eq!(pkgs.len(), 2);
        assert!(!pkgs[0].is_editable());
        assert!(pkgs[1].is_editable());
    }

    #[test]
    fn invalid_list_json_is_unexpected_output() {
        assert!(matches!(
            parse_list_json("uv", "not json"),
            Err(Error::UnexpectedOutput { .. })
        ));
    }

    #[test]
    fn freeze_skips_comments() {
        let out = "numpy==1.26.0\n# Editable install with no version control\n-e /src/mylib\n\n";
        assert_eq!(parse_freeze(out), vec!["numpy==1.26.0", "-e /src/mylib"]);
    }
}
