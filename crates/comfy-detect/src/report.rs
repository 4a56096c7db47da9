//! Detection outputs: manifest, diagnostic log and requirements file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use comfy_manifest::package::requirement_spec;
use comfy_manifest::MigrationManifest;
use serde::Serialize;

use crate::conflicts::Conflict;
use crate::descriptor::ExtensionDescriptor;
use crate::error::Result;
use crate::generator::DroppedNode;

pub const MANIFEST_FILE: &str = "comfyui_migration.json";
pub const DETECTION_LOG_FILE: &str = "comfyui_detection_log.json";
pub const REQUIREMENTS_FILE: &str = "comfyui_requirements.txt";

/// Everything one detection run learned. Serialized as the diagnostic log;
/// only `manifest` is consumed downstream.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub generated_at: DateTime<Utc>,
    pub app_dir: PathBuf,
    pub python: PathBuf,
    pub manifest: MigrationManifest,
    /// Every installed package, not only the declared ones.
    pub installed_packages: BTreeMap<String, String>,
    pub freeze: Vec<String>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
    pub extensions: Vec<ExtensionDescriptor>,
    pub dropped_nodes: Vec<DroppedNode>,
}

/// Paths written by [`DetectionReport::write_outputs`].
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub manifest: PathBuf,
    pub log: PathBuf,
    pub requirements: PathBuf,
}

impl DetectionReport {
    pub fn write_outputs(&self, dir: &Path) -> Result<OutputPaths> {
        let paths = OutputPaths {
            manifest: dir.join(MANIFEST_FILE),
            log: dir.join(DETECTION_LOG_FILE),
            requirements: dir.join(REQUIREMENTS_FILE),
        };
        self.manifest.save(&paths.manifest)?;
        comfy_fs::io::write_json(&paths.log, self)?;
        comfy_fs::io::write_atomic(&paths.requirements, requirements_text(&self.manifest).as_bytes())?;
        tracing::info!(dir = %dir.display(), "wrote detection outputs");
        Ok(paths)
    }
}

/// A pip requirements file equivalent to the manifest's dependencies.
pub fn requirements_text(manifest: &MigrationManifest) -> String {
    let deps = &manifest.dependencies;
    let mut lines = Vec::new();

    let mut pinned: BTreeMap<&str, &str> = deps
        .packages
        .iter()
        .map(|(n, v)| (n.as_str(), v.as_str()))
        .collect();
    if let Some(pytorch) = &deps.pytorch {
        lines.push(format!("--extra-index-url {}", pytorch.index_url));
        pinned.extend(pytorch.packages.iter().map(|(n, v)| (n.as_str(), v.as_str())));
    }

    lines.extend(pinned.into_iter().map(|(name, version)| requirement_spec(name, version)));
    lines.extend(deps.git_requirements.iter().cloned());
    lines.extend(deps.editable_installs.iter().map(|e| format!("-e {e}")));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
