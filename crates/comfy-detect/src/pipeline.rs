//! The detection pipeline: system, packages, extensions, manifest

use std::fs;
use std::path::Path;

use chrono::Utc;
use comfy_manifest::package::parse_requirements;
use comfy_tools::PackageManager;

use crate::config::DetectConfig;
use crate::conflicts::{self, DependencySource};
use crate::error::{Error, Result};
use crate::generator::ManifestGenerator;
use crate::packages::PackageDetector;
use crate::priority::assign_priority;
use crate::report::DetectionReport;
use crate::scanner::ExtensionScanner;
use crate::system::{discover_python, SystemDetector};
use crate::validation::RemoteValidator;

/// Source name used for the application's own requirements.
pub const APP_SOURCE: &str = "comfyui";

pub struct Detector {
    config: DetectConfig,
    manager: Box<dyn PackageManager>,
}

impl Detector {
    pub fn new(config: DetectConfig, manager: Box<dyn PackageManager>) -> Self {
        Self { config, manager }
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Capture the environment rooted at `app_dir`.
    ///
    /// Fails only when the application or its interpreter cannot be
    /// inspected. Per-extension problems end up in the report.
    pub async fn run(&self, app_dir: &Path) -> Result<DetectionReport> {
        if !app_dir.is_dir() {
            return Err(Error::AppNotFound {
                path: app_dir.to_path_buf(),
            });
        }
        let python = discover_python(app_dir, self.config.python.as_deref());
        tracing::info!(app = %app_dir.display(), python = %python.display(), "starting detection");

        let installed = PackageDetector::new(self.manager.as_ref(), &python)
            .detect()
            .await?;
        let system_info = SystemDetector::new(&python, &self.config.nvidia_smi)
            .detect(app_dir, installed.version("torch"))
            .await?;

        let mut extensions = if self.config.skip_custom_nodes {
            Vec::new()
        } else {
            ExtensionScanner::new().scan(&app_dir.join("custom_nodes"))?
        };

        if self.config.validate_registry && !extensions.is_empty() {
            let validator = RemoteValidator::new(&self.config.remote)?;
            for desc in &mut extensions {
                validator.validate(desc).await;
            }
        }
        for desc in &mut extensions {
            assign_priority(desc, &self.config.scoring);
            tracing::debug!(
                node = %desc.name,
                priority = %desc.install_priority,
                score = desc.priority_score,
                reason = %desc.priority_reason,
                "ranked custom node"
            );
        }

        let mut sources = vec![DependencySource::new(APP_SOURCE, app_requirements(app_dir))];
        sources.extend(
            extensions
                .iter()
                .map(|d| DependencySource::new(&d.name, d.requirements.clone())),
        );
        let resolution = conflicts::resolve(&sources, &installed);
        if !resolution.conflicts.is_empty() {
            tracing::warn!(count = resolution.conflicts.len(), "installed packages violate declared constraints");
        }

        let (manifest, dropped_nodes) =
            ManifestGenerator::new().generate(system_info, &extensions, &installed, &resolution);
        manifest.validate()?;

        let mut warnings = resolution.warnings.clone();
        warnings.extend(
            dropped_nodes
                .iter()
                .map(|d| format!("custom node {} left out: {}", d.name, d.reason)),
        );

        tracing::info!(
            nodes = manifest.custom_nodes.len(),
            packages = manifest.dependencies.total_count(),
            dropped = dropped_nodes.len(),
            "detection complete"
        );
        Ok(DetectionReport {
            generated_at: Utc::now(),
            app_dir: app_dir.to_path_buf(),
            python,
            manifest,
            installed_packages: installed.versions,
            freeze: installed.freeze,
            conflicts: resolution.conflicts,
            warnings,
            extensions,
            dropped_nodes,
        })
    }
}

fn app_requirements(app_dir: &Path) -> Vec<comfy_manifest::Requirement> {
    fs::read_to_string(app_dir.join("requirements.txt"))
        .map(|content| parse_requirements(&content))
        .unwrap_or_default()
}
