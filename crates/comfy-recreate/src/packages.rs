//! Dependency installation with batch-then-individual fallback
//!
//! Each dependency class goes to the installer as one batch. When the batch
//! fails every spec is retried on its own, and a spec carrying a pre-release
//! marker gets one more attempt with pre-releases allowed. A class succeeds
//! when at least `threshold` of its specs installed; a successful batch
//! counts as all of them.

use std::fmt;
use std::path::Path;

use comfy_manifest::package::requirement_spec;
use comfy_manifest::DependencySpec;
use comfy_tools::{InstallOptions, PackageManager};
use serde::Serialize;

/// Substrings that mark a spec as a pre-release or development build.
pub const PRERELEASE_MARKERS: [&str; 5] = [".dev", "dev0", "alpha", "beta", "rc"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyClass {
    Pytorch,
    Packages,
    GitRequirements,
    EditableInstalls,
}

impl fmt::Display for DependencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DependencyClass::Pytorch => "pytorch",
            DependencyClass::Packages => "packages",
            DependencyClass::GitRequirements => "git requirements",
            DependencyClass::EditableInstalls => "editable installs",
        })
    }
}

/// Outcome of installing one class. Check `installed_count` against
/// `total` rather than relying on `success` alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageInstallResult {
    pub success: bool,
    pub installed_count: usize,
    pub total: usize,
    pub failed_packages: Vec<String>,
    /// Specs that only installed once pre-releases were allowed.
    pub prerelease_retries: Vec<String>,
}

impl PackageInstallResult {
    fn complete(total: usize) -> Self {
        Self {
            success: true,
            installed_count: total,
            total,
            failed_packages: Vec::new(),
            prerelease_retries: Vec::new(),
        }
    }
}

pub fn needs_prerelease(spec: &str) -> bool {
    let spec = spec.to_ascii_lowercase();
    PRERELEASE_MARKERS.iter().any(|m| spec.contains(m))
}

/// Install specs for every class of `deps`, in install order.
pub fn dependency_batches(deps: &DependencySpec) -> Vec<(DependencyClass, Vec<String>, InstallOptions)> {
    let mut batches = Vec::new();
    if let Some(pytorch) = &deps.pytorch {
        batches.push((
            DependencyClass::Pytorch,
            pytorch
                .packages
                .iter()
                .map(|(name, version)| requirement_spec(name, version))
                .collect(),
            InstallOptions::default().with_index_url(&pytorch.index_url),
        ));
    }
    batches.push((
        DependencyClass::Packages,
        deps.packages
            .iter()
            .map(|(name, version)| requirement_spec(name, version))
            .collect(),
        InstallOptions::default(),
    ));
    batches.push((
        DependencyClass::GitRequirements,
        deps.git_requirements.clone(),
        InstallOptions::default(),
    ));
    batches.push((
        DependencyClass::EditableInstalls,
        deps.editable_installs.clone(),
        InstallOptions::default().with_editable(true),
    ));
    batches
}

pub struct PackageInstaller<'a> {
    manager: &'a dyn PackageManager,
    python: &'a Path,
    threshold: f64,
}

impl<'a> PackageInstaller<'a> {
    pub fn new(manager: &'a dyn PackageManager, python: &'a Path, threshold: f64) -> Self {
        Self {
            manager,
            python,
            threshold,
        }
    }

    pub async fn install(
        &self,
        class: DependencyClass,
        specs: &[String],
        options: &InstallOptions,
    ) -> PackageInstallResult {
        let total = specs.len();
        if total == 0 {
            return PackageInstallResult::complete(0);
        }

        tracing::info!(class = %class, count = total, manager = self.manager.name(), "installing dependency class");
        let batch_error = match self.manager.install(self.python, specs, options).await {
            Ok(_) => return PackageInstallResult::complete(total),
            Err(e) => e,
        };
        tracing::warn!(class = %class, error = %batch_error, "batch install failed, retrying individually");

        let mut installed_count = 0;
        let mut failed_packages = Vec::new();
        let mut prerelease_retries = Vec::new();
        for spec in specs {
            let single = std::slice::from_ref(spec);
            let err = match self.manager.install(self.python, single, options).await {
                Ok(_) => {
                    installed_count += 1;
                    continue;
                }
                Err(e) => e,
            };

            if !options.prerelease && needs_prerelease(spec) {
                let retry = options.clone().with_prerelease(true);
                if self.manager.install(self.python, single, &retry).await.is_ok() {
                    tracing::info!(spec = %spec, "installed with pre-releases allowed");
                    installed_count += 1;
                    prerelease_retries.push(spec.clone());
                    continue;
                }
            }
            tracing::warn!(spec = %spec, error = %err, "package install failed");
            failed_packages.push(spec.clone());
        }

        let ratio = installed_count as f64 / total as f64;
        let success = ratio >= self.threshold;
        if !success {
            tracing::error!(
                class = %class,
                installed = installed_count,
                total,
                "dependency class below success threshold"
            );
        }
        PackageInstallResult {
            success,
            installed_count,
            total,
            failed_packages,
            prerelease_retries,
        }
    }
}
