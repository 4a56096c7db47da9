//! [`EnvironmentRecreator`]: replays a manifest onto a target directory.
//!
//! Steps run in a fixed order and only the venv is a hard prerequisite:
//!
//! 1. validate the manifest and create the directory layout
//! 2. `uv python install`, then `uv venv` (fatal)
//! 3. clone the application unless it is already there
//! 4. dependency classes (accelerator, regular, VCS, editable)
//! 5. custom nodes
//! 6. validation against the manifest

use std::fs;
use std::path::Path;
use std::time::Instant;

use comfy_cache::NodeCache;
use comfy_fs::tree::is_missing_or_empty;
use comfy_manifest::MigrationManifest;
use comfy_tools::python::venv_python_path;
use comfy_tools::{GitCli, PackageManager, UvTool};

use crate::config::{APP_DIR, CUSTOM_NODES_DIR, RecreateConfig, VENV_DIR};
use crate::error::{Error, Result};
use crate::nodes::CustomNodeInstaller;
use crate::packages::{PackageInstaller, dependency_batches};
use crate::result::{ClassOutcome, EnvironmentResult};
use crate::validator::validate_environment;

pub struct EnvironmentRecreator {
    config: RecreateConfig,
    uv: UvTool,
    /// Installer for packages; uv unless overridden.
    manager: Option<Box<dyn PackageManager>>,
}

impl EnvironmentRecreator {
    pub fn new(config: RecreateConfig) -> Self {
        let mut uv = UvTool::new(&config.uv);
        if let Some(dir) = &config.uv_cache_dir {
            uv = uv.with_cache_dir(dir);
        }
        if let Some(dir) = &config.python_install_dir {
            uv = uv.with_python_install_dir(dir);
        }
        Self {
            config,
            uv,
            manager: None,
        }
    }

    /// Install packages with `manager` instead of uv. Runtime and venv
    /// creation still go through uv.
    pub fn with_package_manager(mut self, manager: Box<dyn PackageManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn config(&self) -> &RecreateConfig {
        &self.config
    }

    fn package_manager(&self) -> &dyn PackageManager {
        match &self.manager {
            Some(manager) => manager.as_ref(),
            None => &self.uv,
        }
    }

    fn node_cache(&self) -> Option<NodeCache> {
        if !self.config.enable_cache {
            return None;
        }
        self.config.cache_root.as_ref().map(NodeCache::new)
    }

    /// Recreate `manifest` under `target`.
    ///
    /// Returns `Err` only for problems that leave nothing to report: an
    /// invalid manifest, an unwritable target or a failed venv. Everything
    /// else is collected into the result.
    pub async fn recreate(&self, manifest: &MigrationManifest, target: &Path) -> Result<EnvironmentResult> {
        let started = Instant::now();
        manifest.validate()?;

        let venv_path = target.join(VENV_DIR);
        let comfyui_path = target.join(APP_DIR);
        let custom_nodes = comfyui_path.join(CUSTOM_NODES_DIR);
        let python_path = venv_python_path(&venv_path);
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        tracing::info!(
            target = %target.display(),
            nodes = manifest.custom_nodes.len(),
            packages = manifest.dependencies.total_count(),
            "recreating environment"
        );
        fs::create_dir_all(target).map_err(|e| comfy_fs::Error::io(target, e))?;

        let python_version = &manifest.system_info.python_version;
        if let Err(e) = self.uv.python_install(python_version).await {
            tracing::warn!(version = %python_version, error = %e, "interpreter install failed");
            warnings.push(format!("python {python_version} install failed: {e}"));
        }
        if let Err(source) = self.uv.venv(&venv_path, python_version).await {
            return Err(Error::VenvCreation {
                path: venv_path,
                source,
            });
        }

        if let Err(e) = self.install_application(manifest, &comfyui_path, &mut warnings).await {
            tracing::error!(error = %e, "application install failed");
            errors.push(format!("application: {e}"));
        }
        fs::create_dir_all(&custom_nodes).map_err(|e| comfy_fs::Error::io(&custom_nodes, e))?;

        let manager = self.package_manager();
        let installer = PackageInstaller::new(manager, &python_path, self.config.success_threshold);
        let mut package_classes = Vec::new();
        for (class, specs, options) in dependency_batches(&manifest.dependencies) {
            let result = installer.install(class, &specs, &options).await;
            if !result.success {
                errors.push(format!(
                    "{class}: only {} of {} installed",
                    result.installed_count, result.total
                ));
            } else if !result.failed_packages.is_empty() {
                warnings.push(format!(
                    "{class}: failed to install {}",
                    result.failed_packages.join(", ")
                ));
            }
            package_classes.push(ClassOutcome { class, result });
        }

        let nodes = CustomNodeInstaller::new(&self.config, self.node_cache(), manager, &python_path)?;
        let node_report = nodes.install_all(&manifest.custom_nodes, &custom_nodes).await;
        warnings.extend(node_report.warnings);
        errors.extend(node_report.errors);

        let validation = validate_environment(manager, &python_path, manifest, &custom_nodes).await;
        warnings.extend(validation.warnings);

        let result = EnvironmentResult {
            success: errors.is_empty(),
            python_path,
            comfyui_path,
            venv_path,
            installed_packages: validation.installed_packages,
            package_classes,
            installed_nodes: node_report.installed,
            failed_nodes: node_report.failed,
            warnings,
            errors,
            duration_seconds: started.elapsed().as_secs_f64(),
        };
        tracing::info!(
            success = result.success,
            nodes = result.installed_nodes.len(),
            failed = result.failed_nodes.len(),
            seconds = result.duration_seconds,
            "recreation finished"
        );
        Ok(result)
    }

    /// Clone the application unless `dest` already has content, then try to
    /// check out the captured version's tag.
    async fn install_application(
        &self,
        manifest: &MigrationManifest,
        dest: &Path,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        if !is_missing_or_empty(dest)? {
            tracing::info!(path = %dest.display(), "application already present, skipping clone");
            return Ok(());
        }
        let git = GitCli::new(&self.config.git);
        git.clone_repo(&self.config.comfyui_repo_url, dest).await?;

        if let Some(version) = &manifest.system_info.comfyui_version {
            let tag = version_tag(version);
            if let Err(e) = git.checkout(dest, &tag).await {
                tracing::warn!(tag = %tag, error = %e, "application version checkout failed");
                warnings.push(format!("could not check out application {tag}: {e}"));
            }
        }
        Ok(())
    }
}

/// Tag for a captured application version: `0.3.10` becomes `v0.3.10`.
fn version_tag(version: &str) -> String {
    let version = version.trim();
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    }
}
