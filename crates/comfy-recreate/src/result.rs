//! Outcome of a recreation run

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::packages::{DependencyClass, PackageInstallResult};

/// Per-class package install outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassOutcome {
    pub class: DependencyClass,
    #[serde(flatten)]
    pub result: PackageInstallResult,
}

/// Everything a recreation run produced. Built once, when the run ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentResult {
    /// True when `errors` is empty.
    pub success: bool,
    pub python_path: PathBuf,
    pub comfyui_path: PathBuf,
    pub venv_path: PathBuf,
    /// Normalized name to version, as reported after installation.
    pub installed_packages: BTreeMap<String, String>,
    pub package_classes: Vec<ClassOutcome>,
    pub installed_nodes: Vec<String>,
    pub failed_nodes: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub duration_seconds: f64,
}
