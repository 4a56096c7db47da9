//! Runtime, accelerator and application version detection

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use comfy_manifest::SystemInfo;
use comfy_tools::python::{self, venv_python_path};
use comfy_tools::timeouts::QUICK_TIMEOUT;
use comfy_tools::ToolCommand;
use git2::{DescribeFormatOptions, DescribeOptions, Repository};
use regex::Regex;

use crate::config::DEFAULT_PYTHON;
use crate::error::Result;

static CUDA_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CUDA Version:\s*([\d.]+)").unwrap());

static DESCRIBED_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?(\d+\.\d+(?:\.\d+)?)").unwrap());

static VERSION_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^__version__\s*=\s*["']([^"']+)["']"#).unwrap()
});

/// The interpreter to inspect: the configured one, else a virtual
/// environment beside or inside the application, else `python3` from `PATH`.
pub fn discover_python(app_dir: &Path, configured: Option<&Path>) -> PathBuf {
    if let Some(python) = configured {
        return python.to_path_buf();
    }
    let mut candidates = Vec::new();
    if let Some(parent) = app_dir.parent() {
        candidates.push(parent.join(".venv"));
    }
    candidates.push(app_dir.join("venv"));
    candidates.push(app_dir.join(".venv"));

    candidates
        .iter()
        .map(|venv| venv_python_path(venv))
        .find(|p| p.is_file())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON))
}

/// Collects [`SystemInfo`] for an application install.
#[derive(Debug, Clone)]
pub struct SystemDetector {
    python: PathBuf,
    nvidia_smi: PathBuf,
}

impl SystemDetector {
    pub fn new(python: impl Into<PathBuf>, nvidia_smi: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            nvidia_smi: nvidia_smi.into(),
        }
    }

    /// Only the interpreter version is required; every other field is
    /// best-effort. `installed_torch` is the package-list fallback for the
    /// torch version.
    pub async fn detect(&self, app_dir: &Path, installed_torch: Option<&str>) -> Result<SystemInfo> {
        let python_version = python::python_version(&self.python).await?;
        let mut info = SystemInfo::new(python_version);

        info.cuda_version = self.cuda_version().await;
        info.torch_version = match python::torch_version(&self.python).await {
            Ok(Some(v)) => Some(v),
            Ok(None) => installed_torch.map(str::to_string),
            Err(e) => {
                tracing::debug!(error = %e, "torch introspection failed");
                installed_torch.map(str::to_string)
            }
        };
        info.comfyui_version = app_version(app_dir);

        tracing::info!(
            python = %info.python_version,
            cuda = info.cuda_version.as_deref().unwrap_or("-"),
            torch = info.torch_version.as_deref().unwrap_or("-"),
            comfyui = info.comfyui_version.as_deref().unwrap_or("-"),
            "detected system"
        );
        Ok(info)
    }

    async fn cuda_version(&self) -> Option<String> {
        let out = ToolCommand::new(&self.nvidia_smi)
            .timeout(QUICK_TIMEOUT)
            .run()
            .await
            .map_err(|e| tracing::debug!(error = %e, "nvidia-smi unavailable"))
            .ok()?;
        parse_cuda_version(&out.stdout)
    }
}

pub fn parse_cuda_version(output: &str) -> Option<String> {
    CUDA_VERSION
        .captures(output)
        .map(|caps| caps[1].trim_end_matches('.').to_string())
}

/// Application version from `git describe --tags`, else `comfyui_version.py`.
pub fn app_version(app_dir: &Path) -> Option<String> {
    described_version(app_dir).or_else(|| {
        let content = fs::read_to_string(app_dir.join("comfyui_version.py")).ok()?;
        VERSION_ASSIGNMENT
            .captures(&content)
            .map(|caps| caps[1].to_string())
    })
}

fn described_version(app_dir: &Path) -> Option<String> {
    if !app_dir.join(".git").exists() {
        return None;
    }
    let repo = Repository::open(app_dir).ok()?;
    let description = repo
        .describe(DescribeOptions::new().describe_tags())
        .and_then(|d| d.format(Some(&DescribeFormatOptions::new())))
        .map_err(|e| tracing::debug!(error = %e, "git describe failed"))
        .ok()?;
    DESCRIBED_VERSION
        .captures(&description)
        .map(|caps| caps[1].to_string())
}
